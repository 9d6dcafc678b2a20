//! Per-path configuration
//!
//! A [`PathConf`] is an immutable value. The registry replaces it wholesale
//! on reload and path actors read it through a shared guard, so nothing in
//! this module mutates a configuration that is already in use.

use std::fmt;
use std::time::Duration;

use regex::Regex;

use crate::error::{PathError, Result};

/// Name of the catch-all configuration, matched after every other entry
pub const ALL_OTHERS: &str = "all_others";

/// Where a path gets its stream from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Clients publish to the path
    #[default]
    Publisher,
    /// Readers are redirected to `source_redirect`
    Redirect,
    /// The stream is pulled from a remote URL
    Pull(String),
    /// The stream is read from a local camera device
    Camera,
}

impl SourceKind {
    /// Whether this source is driven by a static source runner
    pub fn is_static(&self) -> bool {
        matches!(self, SourceKind::Pull(_) | SourceKind::Camera)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Publisher => write!(f, "publisher"),
            SourceKind::Redirect => write!(f, "redirect"),
            SourceKind::Pull(url) => write!(f, "{}", url),
            SourceKind::Camera => write!(f, "rpiCamera"),
        }
    }
}

/// Transport used when pulling from an RTSP source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtspTransport {
    #[default]
    Automatic,
    Udp,
    Multicast,
    Tcp,
}

/// Recording container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFormat {
    #[default]
    Fmp4,
    MpegTs,
}

/// Camera image tuning
///
/// These settings can be changed while the camera is running.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTuning {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub sharpness: f64,
    pub exposure: String,
    pub flicker_period: u32,
    pub awb: String,
    pub awb_gains: Vec<f64>,
    pub denoise: String,
    pub shutter: u32,
    pub metering: String,
    pub gain: f64,
    pub ev: f64,
    pub fps: f64,
    pub idr_period: u32,
    pub bitrate: u32,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            sharpness: 1.0,
            exposure: "normal".into(),
            flicker_period: 0,
            awb: "auto".into(),
            awb_gains: vec![0.0, 0.0],
            denoise: "off".into(),
            shutter: 0,
            metering: "centre".into(),
            gain: 0.0,
            ev: 0.0,
            fps: 30.0,
            idr_period: 60,
            bitrate: 1_000_000,
        }
    }
}

/// Camera device settings
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConf {
    /// Camera index
    pub camera_id: u32,
    pub width: u32,
    pub height: u32,
    pub h_flip: bool,
    pub v_flip: bool,
    /// Settings that can be hot reloaded
    pub tuning: CameraTuning,
}

impl Default for CameraConf {
    fn default() -> Self {
        Self {
            camera_id: 0,
            width: 1920,
            height: 1080,
            h_flip: false,
            v_flip: false,
            tuning: CameraTuning::default(),
        }
    }
}

/// Compiled name pattern of a configuration whose name starts with `~`
#[derive(Debug, Clone)]
pub struct PathPattern(Regex);

impl PathPattern {
    /// Compile a pattern
    pub fn new(expr: &str) -> Result<Self> {
        Regex::new(expr)
            .map(PathPattern)
            .map_err(|e| PathError::InvalidName {
                name: expr.to_string(),
                reason: format!("invalid regular expression: {}", e),
            })
    }

    /// Match a name, returning the full match followed by capture groups
    pub fn captures(&self, name: &str) -> Option<Vec<String>> {
        self.0.captures(name).map(|caps| {
            caps.iter()
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect()
        })
    }

    /// Source expression
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

/// Configuration of a single path (or path pattern)
#[derive(Debug, Clone, PartialEq)]
pub struct PathConf {
    /// Configuration name, either a fixed path name or `~regex`
    pub name: String,

    /// Compiled pattern for `~` names and `all_others`
    pub regexp: Option<PathPattern>,

    // Source
    pub source: SourceKind,
    pub source_fingerprint: String,
    pub source_on_demand: bool,
    pub source_on_demand_start_timeout: Duration,
    pub source_on_demand_close_after: Duration,
    pub source_redirect: String,
    pub rtsp_transport: RtspTransport,
    pub camera: CameraConf,

    // General
    /// Maximum number of readers (0 = unlimited)
    pub max_readers: usize,
    /// Path readers are redirected to when nothing is available
    pub fallback: String,
    /// Whether a new publisher may kick out the current one
    pub override_publisher: bool,

    // Recording
    pub record: bool,
    pub record_path: String,
    pub record_format: RecordFormat,
    pub record_part_duration: Duration,
    pub record_max_part_size: u64,
    pub record_segment_duration: Duration,
    pub record_delete_after: Duration,

    // Hooks
    pub run_on_init: String,
    pub run_on_init_restart: bool,
    pub run_on_demand: String,
    pub run_on_demand_restart: bool,
    pub run_on_demand_start_timeout: Duration,
    pub run_on_demand_close_after: Duration,
    pub run_on_un_demand: String,
    pub run_on_ready: String,
    pub run_on_ready_restart: bool,
    pub run_on_not_ready: String,
    pub run_on_record_segment_create: String,
    pub run_on_record_segment_complete: String,
}

impl Default for PathConf {
    fn default() -> Self {
        Self {
            name: String::new(),
            regexp: None,
            source: SourceKind::Publisher,
            source_fingerprint: String::new(),
            source_on_demand: false,
            source_on_demand_start_timeout: Duration::from_secs(10),
            source_on_demand_close_after: Duration::from_secs(10),
            source_redirect: String::new(),
            rtsp_transport: RtspTransport::Automatic,
            camera: CameraConf::default(),
            max_readers: 0,
            fallback: String::new(),
            override_publisher: true,
            record: false,
            record_path: "./recordings/%path/%Y-%m-%d_%H-%M-%S-%f".into(),
            record_format: RecordFormat::Fmp4,
            record_part_duration: Duration::from_secs(1),
            record_max_part_size: 50 * 1024 * 1024,
            record_segment_duration: Duration::from_secs(3600),
            record_delete_after: Duration::from_secs(24 * 3600),
            run_on_init: String::new(),
            run_on_init_restart: false,
            run_on_demand: String::new(),
            run_on_demand_restart: false,
            run_on_demand_start_timeout: Duration::from_secs(10),
            run_on_demand_close_after: Duration::from_secs(10),
            run_on_un_demand: String::new(),
            run_on_ready: String::new(),
            run_on_ready_restart: false,
            run_on_not_ready: String::new(),
            run_on_record_segment_create: String::new(),
            run_on_record_segment_complete: String::new(),
        }
    }
}

impl PathConf {
    /// Create a configuration for the given name
    ///
    /// Names starting with `~` are compiled as regular expressions and
    /// `all_others` matches any name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let regexp = if let Some(expr) = name.strip_prefix('~') {
            Some(PathPattern::new(expr)?)
        } else if name == ALL_OTHERS {
            Some(PathPattern::new("^.*$")?)
        } else {
            validate_path_name(&name)?;
            None
        };

        Ok(Self {
            name,
            regexp,
            ..Default::default()
        })
    }

    /// Set the source
    pub fn source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    /// Pull the stream from a URL
    pub fn pull(mut self, url: impl Into<String>) -> Self {
        self.source = SourceKind::Pull(url.into());
        self
    }

    /// Redirect readers to another path or URL
    pub fn redirect(mut self, target: impl Into<String>) -> Self {
        self.source = SourceKind::Redirect;
        self.source_redirect = target.into();
        self
    }

    /// Start the static source only when someone asks for it
    pub fn source_on_demand(mut self, start_timeout: Duration, close_after: Duration) -> Self {
        self.source_on_demand = true;
        self.source_on_demand_start_timeout = start_timeout;
        self.source_on_demand_close_after = close_after;
        self
    }

    /// Launch a publisher command when someone asks for the path
    pub fn run_on_demand(
        mut self,
        cmd: impl Into<String>,
        start_timeout: Duration,
        close_after: Duration,
    ) -> Self {
        self.run_on_demand = cmd.into();
        self.run_on_demand_start_timeout = start_timeout;
        self.run_on_demand_close_after = close_after;
        self
    }

    /// Set the maximum number of readers (0 = unlimited)
    pub fn max_readers(mut self, max: usize) -> Self {
        self.max_readers = max;
        self
    }

    /// Set the fallback path
    pub fn fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Allow or forbid publisher override
    pub fn override_publisher(mut self, enabled: bool) -> Self {
        self.override_publisher = enabled;
        self
    }

    /// Enable recording to the given path template
    pub fn record(mut self, record_path: impl Into<String>) -> Self {
        self.record = true;
        self.record_path = record_path.into();
        self
    }

    /// Whether the path is served by a static source runner
    pub fn has_static_source(&self) -> bool {
        self.source.is_static()
    }

    /// Whether the static source is started on demand
    pub fn has_on_demand_static_source(&self) -> bool {
        self.has_static_source() && self.source_on_demand
    }

    /// Whether a publisher command is launched on demand
    pub fn has_on_demand_publisher(&self) -> bool {
        self.source == SourceKind::Publisher && !self.run_on_demand.is_empty()
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| PathError::InvalidName {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.regexp.is_none() {
            validate_path_name(&self.name)?;
        }

        if self.source_on_demand && !self.has_static_source() {
            return Err(invalid(
                "'sourceOnDemand' is useless when source is not a static source",
            ));
        }

        if self.source == SourceKind::Redirect && self.source_redirect.is_empty() {
            return Err(invalid("'sourceRedirect' is required when source is 'redirect'"));
        }

        if self.source == SourceKind::Camera && self.regexp.is_some() {
            return Err(invalid("a camera source can't be used with a path pattern"));
        }

        if !self.run_on_demand.is_empty() && self.source != SourceKind::Publisher {
            return Err(invalid("'runOnDemand' can be used only when source is 'publisher'"));
        }

        Ok(())
    }
}

/// Check that a requested name is usable as a path name
pub fn validate_path_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| PathError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("cannot be empty"));
    }
    if name.starts_with('/') {
        return Err(invalid("can't begin with a slash"));
    }
    if name.ends_with('/') {
        return Err(invalid("can't end with a slash"));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || "_-/.~:".contains(c);
    if !name.chars().all(allowed) {
        return Err(invalid("can contain only alphanumeric characters, underscore, dot, tilde, minus, slash or colon"));
    }

    Ok(())
}
