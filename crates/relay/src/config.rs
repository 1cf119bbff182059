use {
    crate::{RelayError, rate_interval},
    base::Vec2,
    std::{path::PathBuf, str::FromStr, time::Duration},
};

/// What happens when a camera connects while another one is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPolicy {
    /// Every camera gets its own handler; the raw slot is last-writer-wins.
    Shared,
    /// Only one camera at a time; later ones are closed after the handshake.
    Exclusive,
}

impl FromStr for CameraPolicy {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shared" => Ok(CameraPolicy::Shared),
            "exclusive" => Ok(CameraPolicy::Exclusive),
            other => Err(RelayError::Config(format!("unknown camera policy: {other}"))),
        }
    }
}

/// Runtime configuration for the relay.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    camera_addr: String,
    viewer_addr: String,
    control_addr: String,
    size: Vec2<usize>,
    max_message_size: usize,
    frame_rate: f32,
    forward_rate: f32,
    jpeg_quality: u8,
    preview: bool,
    camera_policy: CameraPolicy,
    send_timeout: Duration,
    poll_timeout: Duration,
    idle_sleep: Duration,
    wait_for_control: bool,
    horizontal_fov: f32,
    log_dir: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            camera_addr: "0.0.0.0:8765".to_string(),
            viewer_addr: "0.0.0.0:8766".to_string(),
            control_addr: "0.0.0.0:8910".to_string(),
            size: Vec2::new(640, 480),
            max_message_size: com::MAX_MESSAGE_SIZE,
            frame_rate: 30.0,
            forward_rate: 30.0,
            jpeg_quality: 80,
            preview: false,
            camera_policy: CameraPolicy::Shared,
            send_timeout: Duration::from_secs(1),
            poll_timeout: Duration::from_millis(50),
            idle_sleep: Duration::from_millis(1),
            wait_for_control: true,
            horizontal_fov: 60.0,
            log_dir: None,
        }
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, RelayError> {
    value
        .trim()
        .parse()
        .map_err(|_| RelayError::Config(format!("invalid value for {name}: {value:?}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, RelayError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RelayError::Config(format!("invalid value for {name}: {value:?}"))),
    }
}

impl RelayConfig {
    /// Defaults overlaid with any `RELAY_*` environment variables.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each `RELAY_*` name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RelayError> {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RELAY_CAMERA_ADDR") {
            config.camera_addr = v;
        }
        if let Some(v) = get("RELAY_VIEWER_ADDR") {
            config.viewer_addr = v;
        }
        if let Some(v) = get("RELAY_CONTROL_ADDR") {
            config.control_addr = v;
        }
        if let Some(v) = get("RELAY_WIDTH") {
            config.size.x = parse("RELAY_WIDTH", &v)?;
        }
        if let Some(v) = get("RELAY_HEIGHT") {
            config.size.y = parse("RELAY_HEIGHT", &v)?;
        }
        if let Some(v) = get("RELAY_MAX_MESSAGE_SIZE") {
            config.max_message_size = parse("RELAY_MAX_MESSAGE_SIZE", &v)?;
        }
        if let Some(v) = get("RELAY_FRAME_RATE") {
            config.frame_rate = parse("RELAY_FRAME_RATE", &v)?;
        }
        if let Some(v) = get("RELAY_FORWARD_RATE") {
            config.forward_rate = parse("RELAY_FORWARD_RATE", &v)?;
        }
        if let Some(v) = get("RELAY_JPEG_QUALITY") {
            config.jpeg_quality = parse("RELAY_JPEG_QUALITY", &v)?;
        }
        if let Some(v) = get("RELAY_PREVIEW") {
            config.preview = parse_bool("RELAY_PREVIEW", &v)?;
        }
        if let Some(v) = get("RELAY_CAMERA_POLICY") {
            config.camera_policy = v.parse()?;
        }
        if let Some(v) = get("RELAY_SEND_TIMEOUT_MS") {
            config.send_timeout = Duration::from_millis(parse("RELAY_SEND_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("RELAY_WAIT_FOR_CONTROL") {
            config.wait_for_control = parse_bool("RELAY_WAIT_FOR_CONTROL", &v)?;
        }
        if let Some(v) = get("RELAY_HORIZONTAL_FOV") {
            config.horizontal_fov = parse("RELAY_HORIZONTAL_FOV", &v)?;
        }
        if let Some(v) = get("RELAY_LOG_DIR") {
            config.log_dir = Some(PathBuf::from(v));
        }

        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.size.x == 0 || self.size.y == 0 {
            return Err(RelayError::Config(format!("frame size {} is empty", self.size)));
        }
        for (name, rate) in [("detection", self.frame_rate), ("forward", self.forward_rate)] {
            if rate_interval(rate).is_none() {
                return Err(RelayError::Config(format!(
                    "{name} rate {rate} must be a finite positive number of frames per second"
                )));
            }
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(RelayError::Config(format!(
                "JPEG quality {} outside 1..=100",
                self.jpeg_quality
            )));
        }
        if self.max_message_size < self.size.area() * 4 {
            return Err(RelayError::Config(format!(
                "max message size {} cannot hold a {} RGBA frame",
                self.max_message_size, self.size
            )));
        }
        Ok(())
    }

    pub fn with_camera_addr(mut self, addr: impl Into<String>) -> Self {
        self.camera_addr = addr.into();
        self
    }

    pub fn with_viewer_addr(mut self, addr: impl Into<String>) -> Self {
        self.viewer_addr = addr.into();
        self
    }

    pub fn with_control_addr(mut self, addr: impl Into<String>) -> Self {
        self.control_addr = addr.into();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.size.x = width;
        self
    }

    pub fn with_height(mut self, height: usize) -> Self {
        self.size.y = height;
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Target rate of the detection loop, frames per second.
    pub fn with_frame_rate(mut self, frame_rate: f32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Target rate of the forward loop, frames per second.
    pub fn with_forward_rate(mut self, forward_rate: f32) -> Self {
        self.forward_rate = forward_rate;
        self
    }

    pub fn with_jpeg_quality(mut self, jpeg_quality: u8) -> Self {
        self.jpeg_quality = jpeg_quality;
        self
    }

    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn with_camera_policy(mut self, camera_policy: CameraPolicy) -> Self {
        self.camera_policy = camera_policy;
        self
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    pub fn with_wait_for_control(mut self, wait_for_control: bool) -> Self {
        self.wait_for_control = wait_for_control;
        self
    }

    pub fn with_horizontal_fov(mut self, horizontal_fov: f32) -> Self {
        self.horizontal_fov = horizontal_fov;
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    // Getters
    pub fn camera_addr(&self) -> &str {
        &self.camera_addr
    }

    pub fn viewer_addr(&self) -> &str {
        &self.viewer_addr
    }

    pub fn control_addr(&self) -> &str {
        &self.control_addr
    }

    pub fn size(&self) -> Vec2<usize> {
        self.size
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    pub fn forward_rate(&self) -> f32 {
        self.forward_rate
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    pub fn preview(&self) -> bool {
        self.preview
    }

    pub fn camera_policy(&self) -> CameraPolicy {
        self.camera_policy
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    pub fn idle_sleep(&self) -> Duration {
        self.idle_sleep
    }

    pub fn wait_for_control(&self) -> bool {
        self.wait_for_control
    }

    pub fn horizontal_fov(&self) -> f32 {
        self.horizontal_fov
    }

    pub fn log_dir(&self) -> Option<&PathBuf> {
        self.log_dir.as_ref()
    }
}
