// src/exec/command.rs

//! Command resolution.
//!
//! A task carries a [`CommandSpec`]. Literal shell commands are used as-is;
//! encode commands are deferred and built from the *current* encode profile
//! at the moment the task is started. Once built, the string is frozen on
//! the task: later profile edits only affect future starts.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::model::{OptionValue, ProfileOptions, ProfilesSection};
use crate::config::validate::validate_profile;
use crate::errors::{PipelineError, Result};

/// Encoder options that never change between profiles.
const FIXED_X265_ARGS: [&str; 23] = [
    "--no-open-gop",
    "--deblock=-1:-1",
    "--colorprim=bt709",
    "--colormatrix=bt709",
    "--transfer=bt709",
    "--range=limited",
    "--hist-scenecut",
    "--no-sao",
    "-b=9",
    "--qcomp=0.65",
    "--qg-size=8",
    "--subme=5",
    "--tu-intra-depth=4",
    "--tu-inter-depth=4",
    "--no-strong-intra-smoothing",
    "--ctu=32",
    "--cbqpoffs=-2",
    "--crqpoffs=-2",
    "--limit-tu=0",
    "--aq-mode=3",
    "--aq-strength=0.7",
    "--merange=32",
    "-D=10",
];

/// Which named encode profile a deferred command draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    /// Clean encode that later gets soft subtitles muxed in.
    Normal,
    /// Encode with subtitles burned into the picture.
    Hardsub,
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::Normal => f.write_str("normal"),
            ProfileKind::Hardsub => f.write_str("hardsub"),
        }
    }
}

impl FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(ProfileKind::Normal),
            "hardsub" => Ok(ProfileKind::Hardsub),
            other => Err(format!(
                "invalid profile: {other} (expected \"normal\" or \"hardsub\")"
            )),
        }
    }
}

/// The two mutable encode profiles of a project.
///
/// Passed by reference into [`CommandSpec::resolve`]; there is no
/// process-wide encoder state.
#[derive(Debug, Clone)]
pub struct EncodeProfiles {
    normal: ProfileOptions,
    hardsub: ProfileOptions,
    defaults: ProfilesSection,
}

impl EncodeProfiles {
    pub fn new(section: &ProfilesSection) -> Self {
        Self {
            normal: section.normal.clone(),
            hardsub: section.hardsub.clone(),
            defaults: section.clone(),
        }
    }

    pub fn get(&self, kind: ProfileKind) -> &ProfileOptions {
        match kind {
            ProfileKind::Normal => &self.normal,
            ProfileKind::Hardsub => &self.hardsub,
        }
    }

    /// Set one option. An edit that would leave the profile invalid (e.g. an
    /// empty `crf`) is rejected and the profile is unchanged.
    pub fn set_option(
        &mut self,
        kind: ProfileKind,
        key: &str,
        value: OptionValue,
    ) -> Result<()> {
        let mut next = self.get(kind).clone();
        next.insert(key.to_string(), value);
        validate_profile(&kind.to_string(), &next)?;
        *self.get_mut(kind) = next;
        Ok(())
    }

    pub fn remove_option(&mut self, kind: ProfileKind, key: &str) -> Result<()> {
        let mut next = self.get(kind).clone();
        next.remove(key);
        validate_profile(&kind.to_string(), &next)?;
        *self.get_mut(kind) = next;
        Ok(())
    }

    /// Restore the profile to the values it was loaded with.
    pub fn reset(&mut self, kind: ProfileKind) {
        let defaults = match kind {
            ProfileKind::Normal => self.defaults.normal.clone(),
            ProfileKind::Hardsub => self.defaults.hardsub.clone(),
        };
        *self.get_mut(kind) = defaults;
    }

    fn get_mut(&mut self, kind: ProfileKind) -> &mut ProfileOptions {
        match kind {
            ProfileKind::Normal => &mut self.normal,
            ProfileKind::Hardsub => &mut self.hardsub,
        }
    }
}

/// What a task runs.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandSpec {
    /// A complete shell command line.
    Shell(String),
    /// A VapourSynth script piped into the encoder, parameterised by a
    /// profile that is read at start time.
    Encode {
        profile: ProfileKind,
        script: PathBuf,
        output: PathBuf,
    },
}

impl CommandSpec {
    pub fn shell(cmd: impl Into<String>) -> Self {
        CommandSpec::Shell(cmd.into())
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, CommandSpec::Encode { .. })
    }

    /// Build the shell command line to dispatch now.
    pub fn resolve(&self, profiles: &EncodeProfiles) -> String {
        match self {
            CommandSpec::Shell(cmd) => cmd.clone(),
            CommandSpec::Encode {
                profile,
                script,
                output,
            } => format!(
                "vspipe -c y4m {} - | x265 --input - --y4m {} -o {}",
                quote_path(script),
                encoder_args(profiles.get(*profile)).join(" "),
                quote_path(output),
            ),
        }
    }
}

/// Profile options as `--name=value`, followed by the fixed options.
///
/// Options with an empty value are left out so the encoder default applies.
pub fn encoder_args(opts: &ProfileOptions) -> Vec<String> {
    opts.iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("--{key}={value}"))
        .chain(FIXED_X265_ARGS.iter().map(|s| s.to_string()))
        .collect()
}

/// Quote a path for inclusion in a `sh -c` command line.
pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

pub fn quote(s: &str) -> String {
    // Only NUL bytes are unquotable, and paths cannot contain them.
    shlex::try_quote(s)
        .unwrap_or(Cow::Borrowed(s))
        .into_owned()
}

/// Parse a `PROFILE.KEY=VALUE` override, e.g. `hardsub.crf=18`.
pub fn parse_param_override(s: &str) -> Result<(ProfileKind, String, OptionValue)> {
    let invalid = |why: &str| {
        PipelineError::ConfigError(format!(
            "invalid --param '{s}': {why} (expected PROFILE.KEY=VALUE)"
        ))
    };

    let (lhs, value) = s.split_once('=').ok_or_else(|| invalid("missing '='"))?;
    let (profile, key) = lhs
        .split_once('.')
        .ok_or_else(|| invalid("missing '.' between profile and option"))?;
    let profile: ProfileKind = profile.parse().map_err(|e: String| invalid(&e))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(invalid("empty option name"));
    }

    let value = value.trim();
    let value = match value.parse::<i64>() {
        Ok(v) => OptionValue::Int(v),
        Err(_) => OptionValue::Text(value.to_string()),
    };
    Ok((profile, key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_spec() -> CommandSpec {
        CommandSpec::Encode {
            profile: ProfileKind::Normal,
            script: PathBuf::from("/p/E01/01.vpy"),
            output: PathBuf::from("/p/E01/video.mkv"),
        }
    }

    #[test]
    fn encode_uses_current_profile_values() {
        let mut profiles = EncodeProfiles::new(&ProfilesSection::default());
        let spec = encode_spec();

        let before = spec.resolve(&profiles);
        let words = shlex::split(&before).unwrap();
        assert_eq!(&words[..4], ["vspipe", "-c", "y4m", "/p/E01/01.vpy"]);
        assert!(words.contains(&"--crf=16".to_string()));
        assert_eq!(words.last().map(String::as_str), Some("/p/E01/video.mkv"));

        profiles
            .set_option(ProfileKind::Normal, "crf", OptionValue::Int(20))
            .unwrap();
        let after = spec.resolve(&profiles);
        assert!(after.contains("--crf=20"));
        // The string built earlier is a plain value and does not follow edits.
        assert!(before.contains("--crf=16"));
    }

    #[test]
    fn empty_options_are_omitted() {
        let mut profiles = EncodeProfiles::new(&ProfilesSection::default());
        profiles
            .set_option(ProfileKind::Hardsub, "tune", "".into())
            .unwrap();
        let args = encoder_args(profiles.get(ProfileKind::Hardsub));
        assert!(!args.iter().any(|a| a.starts_with("--tune")));
        assert_eq!(args[0], "--crf=17");
    }

    #[test]
    fn invalid_edit_leaves_profile_untouched() {
        let mut profiles = EncodeProfiles::new(&ProfilesSection::default());
        let err = profiles
            .set_option(ProfileKind::Normal, "crf", "  ".into())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
        assert_eq!(
            profiles.get(ProfileKind::Normal).get("crf"),
            Some(&OptionValue::Int(16))
        );

        profiles
            .set_option(ProfileKind::Normal, "preset", "slow".into())
            .unwrap();
        profiles.reset(ProfileKind::Normal);
        assert_eq!(
            profiles.get(ProfileKind::Normal).get("preset"),
            Some(&OptionValue::from("slower"))
        );
    }

    #[test]
    fn removing_options() {
        let mut profiles = EncodeProfiles::new(&ProfilesSection::default());
        profiles.remove_option(ProfileKind::Hardsub, "tune").unwrap();
        assert_eq!(profiles.get(ProfileKind::Hardsub).get("tune"), None);

        // crf is required.
        assert!(profiles.remove_option(ProfileKind::Hardsub, "crf").is_err());
        assert_eq!(
            profiles.get(ProfileKind::Hardsub).get("crf"),
            Some(&OptionValue::Int(17))
        );
    }

    #[test]
    fn paths_with_spaces_are_quoted() {
        let spec = CommandSpec::Encode {
            profile: ProfileKind::Hardsub,
            script: PathBuf::from("/my show/E01/chs.vpy"),
            output: PathBuf::from("/my show/E01/chs.mkv"),
        };
        let cmd = spec.resolve(&EncodeProfiles::new(&ProfilesSection::default()));
        let words = shlex::split(&cmd).unwrap();
        assert_eq!(words[3], "/my show/E01/chs.vpy");
        assert_eq!(words.last().map(String::as_str), Some("/my show/E01/chs.mkv"));
        assert!(words.contains(&"--crf=17".to_string()));
    }

    #[test]
    fn param_overrides_parse() {
        let (kind, key, value) = parse_param_override("hardsub.crf=18").unwrap();
        assert_eq!(kind, ProfileKind::Hardsub);
        assert_eq!(key, "crf");
        assert_eq!(value, OptionValue::Int(18));

        let (_, _, value) = parse_param_override("normal.tune=grain").unwrap();
        assert_eq!(value, OptionValue::from("grain"));

        assert!(parse_param_override("crf=18").is_err());
        assert!(parse_param_override("fast.crf=18").is_err());
    }
}
