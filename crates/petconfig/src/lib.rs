use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Largest blur radius accepted for mask softening.
pub const MAX_BLUR_RADIUS: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One selectable animation: a display label and the clip that backs it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnimationDef {
    pub name: String,
    pub path: PathBuf,
}

impl AnimationDef {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Ordered, read-only list of animations offered in the menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<AnimationDef>,
}

impl Catalog {
    pub fn new(entries: Vec<AnimationDef>) -> Self {
        Self { entries }
    }

    pub fn get(&self, index: usize) -> Option<&AnimationDef> {
        self.entries.get(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnimationDef> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PetConfig {
    pub version: u32,
    #[serde(default)]
    pub keying: Keying,
    #[serde(default)]
    pub playback: Playback,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default)]
    pub media: Media,
    #[serde(default)]
    pub menu: MenuLabels,
    #[serde(default)]
    pub animations: Vec<AnimationDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Keying {
    pub tolerance: u8,
    pub background: [u8; 3],
    pub blur_radius: u32,
}

impl Default for Keying {
    fn default() -> Self {
        Self {
            tolerance: 20,
            background: [140, 140, 140],
            blur_radius: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Playback {
    #[serde(
        default = "default_frame_interval",
        deserialize_with = "deserialize_interval",
        serialize_with = "serialize_interval"
    )]
    pub frame_interval: Duration,
    #[serde(default)]
    pub preload: bool,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            frame_interval: default_frame_interval(),
            preload: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Placement {
    pub default_position: [i32; 2],
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            default_position: [100, 100],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Media {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for Media {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MenuLabels {
    pub animations_label: String,
}

impl Default for MenuLabels {
    fn default() -> Self {
        Self {
            animations_label: "Toot".to_string(),
        }
    }
}

const BUILTIN_ANIMATIONS: [(&str, &str); 9] = [
    ("Normal", "videos/normal_toot.mp4"),
    ("Shorty", "videos/short_toot.mp4"),
    ("Tall-Boi", "videos/tall_toot.mp4"),
    ("Tail", "videos/tail_toot.mp4"),
    ("Party", "videos/party_toot.mp4"),
    ("Angry", "videos/angry_toot.mp4"),
    ("Wings", "videos/wing_toot.mp4"),
    ("Music", "videos/music_toot.mp4"),
    ("Light", "videos/light_toot.mp4"),
];

fn default_frame_interval() -> Duration {
    Duration::from_millis(33)
}

/// Converts a frames-per-second request into a tick interval; `None` for
/// non-positive or non-finite rates and for rates so low the interval
/// cannot be represented.
pub fn interval_for_fps(fps: f32) -> Option<Duration> {
    if fps.is_finite() && fps > 0.0 {
        Duration::try_from_secs_f64(1.0 / f64::from(fps)).ok()
    } else {
        None
    }
}

fn serialize_interval<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

/// Accepts a humantime string (`"33ms"`) or a bare number of milliseconds.
fn deserialize_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("an interval as milliseconds or a human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v.trim())
                .map_err(|err| E::custom(format!("invalid interval '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_millis(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("interval must be non-negative"));
            }
            Ok(Duration::from_millis(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("interval must be non-negative"));
            }
            Duration::try_from_secs_f64(v / 1000.0)
                .map_err(|err| E::custom(format!("invalid interval {v}ms: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl Default for PetConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PetConfig {
    /// Configuration used when no file is found: default keying and the
    /// stock nine-clip catalog under `videos/`.
    pub fn builtin() -> Self {
        Self {
            version: 1,
            keying: Keying::default(),
            playback: Playback::default(),
            placement: Placement::default(),
            media: Media::default(),
            menu: MenuLabels::default(),
            animations: BUILTIN_ANIMATIONS
                .iter()
                .map(|(name, path)| AnimationDef::new(*name, *path))
                .collect(),
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PetConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a config file, resolving relative clip paths
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for animation in &mut self.animations {
            if animation.path.is_relative() {
                animation.path = base.join(&animation.path);
            }
        }
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.animations.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.animations.is_empty() {
            return Err(ConfigError::Invalid(
                "config must define at least one animation".into(),
            ));
        }

        let mut seen = HashSet::new();
        for animation in &self.animations {
            let name = animation.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid(
                    "animation names must not be empty".into(),
                ));
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "animation '{name}' is defined more than once"
                )));
            }
            if animation.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "animation '{name}' has an empty path"
                )));
            }
        }

        if self.keying.blur_radius > MAX_BLUR_RADIUS {
            return Err(ConfigError::Invalid(format!(
                "keying.blur_radius must be <= {MAX_BLUR_RADIUS}"
            )));
        }

        if self.playback.frame_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "playback.frame_interval must be greater than zero".into(),
            ));
        }

        if self.menu.animations_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "menu.animations_label must not be empty".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[keying]
tolerance = 30
background = [0, 255, 0]

[playback]
frame_interval = "40ms"
preload = true

[placement]
default_position = [10, 20]

[[animations]]
name = "Normal"
path = "clips/normal.mp4"

[[animations]]
name = "Party"
path = "/abs/party.mp4"
"#;

    #[test]
    fn parses_sample_config() {
        let config = PetConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.keying.tolerance, 30);
        assert_eq!(config.keying.background, [0, 255, 0]);
        assert_eq!(config.keying.blur_radius, 2);
        assert_eq!(config.playback.frame_interval, Duration::from_millis(40));
        assert!(config.playback.preload);
        assert_eq!(config.placement.default_position, [10, 20]);
        assert_eq!(config.menu.animations_label, "Toot");
        let catalog = config.catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.position("party"), Some(1));
    }

    #[test]
    fn bare_interval_is_milliseconds() {
        let config = PetConfig::from_toml_str(
            r#"
version = 1
[playback]
frame_interval = 50
[[animations]]
name = "Normal"
path = "a.mp4"
"#,
        )
        .unwrap();
        assert_eq!(config.playback.frame_interval, Duration::from_millis(50));
    }

    #[test]
    fn rejects_empty_catalog() {
        let err = PetConfig::from_toml_str("version = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = PetConfig::from_toml_str(
            r#"
version = 1
[[animations]]
name = "Normal"
path = "a.mp4"
[[animations]]
name = "normal"
path = "b.mp4"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_tolerance() {
        let err = PetConfig::from_toml_str(
            r#"
version = 1
[keying]
tolerance = 300
[[animations]]
name = "Normal"
path = "a.mp4"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = PetConfig::from_toml_str(
            r#"
version = 1
[playback]
frame_interval = "0ms"
[[animations]]
name = "Normal"
path = "a.mp4"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let config = PetConfig::builtin();
        config.validate().unwrap();
        let catalog = config.catalog();
        assert_eq!(catalog.len(), 9);
        assert_eq!(catalog.get(0).unwrap().name, "Normal");
        assert_eq!(catalog.get(8).unwrap().name, "Light");
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, SAMPLE).unwrap();
        let config = PetConfig::load(&path).unwrap();
        assert_eq!(
            config.animations[0].path,
            dir.path().join("clips/normal.mp4")
        );
        assert_eq!(config.animations[1].path, PathBuf::from("/abs/party.mp4"));
    }

    #[test]
    fn fps_maps_to_interval() {
        assert_eq!(interval_for_fps(25.0), Some(Duration::from_millis(40)));
        assert_eq!(interval_for_fps(0.0), None);
        assert_eq!(interval_for_fps(f32::NAN), None);
    }

    #[test]
    fn vanishing_fps_has_no_interval() {
        assert_eq!(interval_for_fps(1e-30), None);
        assert_eq!(interval_for_fps(f32::MIN_POSITIVE), None);
    }

    #[test]
    fn rejects_unrepresentable_interval() {
        let err = PetConfig::from_toml_str(
            r#"
version = 1
[playback]
frame_interval = 1e300
[[animations]]
name = "Normal"
path = "a.mp4"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
    }
}
