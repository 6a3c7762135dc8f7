//! In-memory process tree.
//!
//! Built from one `ps -eo pid=,ppid=,tty=,args=` call so the resolver can walk
//! parent/child links without touching the OS again.

use std::collections::{HashMap, HashSet, VecDeque};
use std::process::Command;

use super::InjectError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    /// Controlling terminal; `None` for daemons and GUI helpers.
    pub tty: Option<String>,
    /// Full command line.
    pub args: String,
}

impl ProcessInfo {
    /// Lowercased file name of the executable, without a `.exe` suffix.
    pub fn exe_name(&self) -> String {
        let first = self.args.split_whitespace().next().unwrap_or_default();
        let base = first.rsplit(['/', '\\']).next().unwrap_or(first);
        let base = base.to_lowercase();
        base.strip_suffix(".exe").map(str::to_string).unwrap_or(base)
    }
}

#[derive(Debug, Default)]
pub struct ProcessTable {
    procs: HashMap<u32, ProcessInfo>,
    children: HashMap<u32, Vec<u32>>,
}

impl ProcessTable {
    /// Read the current process list.
    pub fn snapshot() -> Result<Self, InjectError> {
        let output = Command::new("ps")
            .args(["-eo", "pid=,ppid=,tty=,args="])
            .output()
            .map_err(|e| InjectError::Process(e.to_string()))?;
        if !output.status.success() {
            return Err(InjectError::Process(format!("ps exited with {}", output.status)));
        }
        Ok(Self::parse(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Parse `ps -eo pid=,ppid=,tty=,args=` output.  Malformed lines are
    /// skipped.
    pub fn parse(output: &str) -> Self {
        Self::from_processes(output.lines().filter_map(parse_line))
    }

    pub fn from_processes(procs: impl IntoIterator<Item = ProcessInfo>) -> Self {
        let mut table = Self::default();
        for p in procs {
            table.children.entry(p.ppid).or_default().push(p.pid);
            table.procs.insert(p.pid, p);
        }
        for kids in table.children.values_mut() {
            kids.sort_unstable();
        }
        table
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessInfo> {
        self.procs.get(&pid)
    }

    pub fn parent(&self, pid: u32) -> Option<&ProcessInfo> {
        self.get(pid).and_then(|p| self.get(p.ppid))
    }

    /// All processes, ordered by pid.
    pub fn processes(&self) -> Vec<&ProcessInfo> {
        let mut all: Vec<&ProcessInfo> = self.procs.values().collect();
        all.sort_unstable_by_key(|p| p.pid);
        all
    }

    /// Every descendant of `pid`, breadth-first.
    pub fn descendants(&self, pid: u32) -> Vec<&ProcessInfo> {
        let mut out = Vec::new();
        // A ps snapshot can hold ppid cycles (pid 0 is its own parent on
        // some systems, and pids get reused between rows).
        let mut seen = HashSet::from([pid]);
        let mut queue: VecDeque<u32> = self.children.get(&pid).cloned().unwrap_or_default().into();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(info) = self.procs.get(&next) {
                out.push(info);
            }
            if let Some(kids) = self.children.get(&next) {
                queue.extend(kids.iter().copied().filter(|k| !seen.contains(k)));
            }
        }
        out
    }
}

fn parse_line(line: &str) -> Option<ProcessInfo> {
    let mut rest = line.trim_start();
    let mut fields = [""; 3];
    for field in fields.iter_mut() {
        let end = rest.find(char::is_whitespace)?;
        *field = &rest[..end];
        rest = rest[end..].trim_start();
    }
    let args = rest.trim_end();
    if args.is_empty() {
        return None;
    }

    let tty = match fields[2] {
        "?" | "??" | "-" => None,
        t => Some(t.to_string()),
    };
    Some(ProcessInfo {
        pid: fields[0].parse().ok()?,
        ppid: fields[1].parse().ok()?,
        tty,
        args: args.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PS: &str = "\
    1     0 ?        /sbin/init
  100     1 ?        /usr/share/code/code --type=main
  101   100 ?        /usr/share/code/code --type=utility extensionHost
  102   101 ?        node /home/dev/.vscode/extensions/claude/bin/claude --ide
  103   100 pts/1    /bin/bash
  104   103 pts/1    claude
  garbage line
  200     1 ??       /Applications/Visual Studio Code.app/Contents/MacOS/Electron
";

    #[test]
    fn parses_fields_and_keeps_args_spaces() {
        let table = ProcessTable::parse(PS);
        let p = table.get(200).unwrap();
        assert_eq!(p.args, "/Applications/Visual Studio Code.app/Contents/MacOS/Electron");
        assert_eq!(p.tty, None);
        assert_eq!(table.get(104).unwrap().tty.as_deref(), Some("pts/1"));
        assert_eq!(table.processes().len(), 7);
    }

    #[test]
    fn descendants_are_breadth_first() {
        let table = ProcessTable::parse(PS);
        let pids: Vec<u32> = table.descendants(100).iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![101, 103, 102, 104]);
        assert!(table.descendants(104).is_empty());
    }

    #[test]
    fn root_self_parent_does_not_loop() {
        let table = ProcessTable::parse("    0     0 ?        kernel\n    1     0 ?        init\n");
        let pids: Vec<u32> = table.descendants(0).iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1]);
    }

    #[test]
    fn parent_cycle_terminates() {
        let table = ProcessTable::parse(
            "   10    12 ?        a\n   11    10 ?        b\n   12    11 ?        c\n",
        );
        let pids: Vec<u32> = table.descendants(10).iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![11, 12]);
        let pids: Vec<u32> = table.descendants(11).iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![12, 10]);
    }

    #[test]
    fn exe_name_strips_path_and_suffix() {
        let table = ProcessTable::parse(PS);
        assert_eq!(table.get(100).unwrap().exe_name(), "code");
        let win = ProcessInfo {
            pid: 1,
            ppid: 0,
            tty: None,
            args: "C:\\Tools\\Cursor.exe --flag".into(),
        };
        assert_eq!(win.exe_name(), "cursor");
        assert_eq!(table.parent(102).map(|p| p.pid), Some(101));
    }
}
