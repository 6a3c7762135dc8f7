//! Built-in keyword profiles.
//!
//! A profile bundles the phrase lists and default voice for one assistant
//! persona.  Lists include common mis-transcriptions of the name, since
//! activation is detected from transcribed text.

/// Phrase lists and voice for a named persona.
#[derive(Debug)]
pub struct Profile {
    pub name: &'static str,
    pub voice: &'static str,
    pub wake: &'static [&'static str],
    pub deactivation: &'static [&'static str],
    pub interrupt: &'static [&'static str],
    pub skip: &'static [&'static str],
    pub finish: &'static [&'static str],
}

const INTERRUPT: &[&str] = &["stop", "quiet", "enough", "halt"];
const SKIP: &[&str] = &["continue", "skip"];

pub const PROFILES: &[Profile] = &[
    Profile {
        name: "samantha",
        voice: "af_aoede",
        wake: &[
            "samantha",
            "hey samantha",
            "hi samantha",
            "hello samantha",
            "ok samantha",
            "okay samantha",
            "samanta",
            "samanthia",
            "samansa",
            "cemantha",
            "somantha",
            "semantha",
            "hey sam",
            "hi sam",
            "hello sam",
            "ok sam",
            "okay sam",
            "a samantha",
            "the samantha",
        ],
        deactivation: &[
            "samantha sleep",
            "samantha goodbye",
            "goodbye samantha",
            "bye samantha",
            "samantha bye",
            "that's all samantha",
            "that is all samantha",
            "samantha go to sleep",
            "go to sleep samantha",
            "samantha pause",
            "pause samantha",
        ],
        interrupt: INTERRUPT,
        skip: SKIP,
        finish: &[
            "stop recording",
            "end recording",
            "finish recording",
            "that is all",
            "that's all",
            "over and out",
            "over out",
            "send message",
            "send it",
            "samantha stop",
            "samantha send",
            "samantha done",
        ],
    },
    Profile {
        name: "jarvis",
        voice: "bm_lewis",
        wake: &[
            "jarvis",
            "hey jarvis",
            "hi jarvis",
            "hello jarvis",
            "ok jarvis",
            "okay jarvis",
            "jarves",
            "jarvice",
            "jervis",
            "jarv",
            "yo jarvis",
            "a jarvis",
            "the jarvis",
        ],
        deactivation: &[
            "jarvis sleep",
            "jarvis standby",
            "standby jarvis",
            "jarvis goodbye",
            "goodbye jarvis",
            "bye jarvis",
            "jarvis bye",
            "that's all jarvis",
            "that is all jarvis",
            "jarvis go to sleep",
            "go to sleep jarvis",
            "jarvis pause",
            "pause jarvis",
        ],
        interrupt: INTERRUPT,
        skip: SKIP,
        finish: &[
            "stop recording",
            "end recording",
            "finish recording",
            "that is all",
            "that's all",
            "over and out",
            "over out",
            "send message",
            "send it",
            "jarvis stop",
            "jarvis send",
            "jarvis done",
        ],
    },
];

impl Profile {
    /// Look up a built-in profile by case-insensitive name.
    pub fn named(name: &str) -> Option<&'static Profile> {
        PROFILES.iter().find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::KeywordSet;

    fn owned(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn every_profile_builds_a_disjoint_set() {
        for p in PROFILES {
            let set = KeywordSet::new(
                &owned(p.wake),
                &owned(p.deactivation),
                &owned(p.interrupt),
                &owned(p.skip),
                &owned(p.finish),
            );
            assert!(set.is_ok(), "profile {} is ambiguous: {:?}", p.name, set.err());
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Profile::named("Jarvis").map(|p| p.voice), Some("bm_lewis"));
        assert!(Profile::named("hal").is_none());
    }
}
