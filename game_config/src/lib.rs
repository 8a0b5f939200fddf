//! Game settings file: every tunable of the character, camera and lattice in
//! one TOML document, with validation that collects all problems at once.
#![forbid(unsafe_code)]

use std::fmt;
use std::path::{Path, PathBuf};

use character_motor::{ControlConfig, PlayerConfig};
use character_surface::SurfaceBands;
use ffd::{LatticeConfig, MAX_AXIS_POINTS};
use player_camera::CameraConfig;
use player_controller::{BodyShape, PlayerSettings};
use proximity_field::{ProximityConfig, WeightedCurve};
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub version: u32,
    pub surface: SurfaceBands,
    pub proximity: ProximityConfig,
    pub player: PlayerConfig,
    pub control: ControlConfig,
    pub camera: CameraConfig,
    pub body: BodyShape,
    pub lattice: LatticeConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            surface: SurfaceBands::default(),
            proximity: ProximityConfig::default(),
            player: PlayerConfig::default(),
            control: ControlConfig::default(),
            camera: CameraConfig::default(),
            body: BodyShape::default(),
            lattice: LatticeConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, error: std::io::Error },
    Parse(String),
    Serialize(String),
    Invalid(Vec<String>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, error } => {
                write!(f, "failed to read {}: {error}", path.display())
            }
            ConfigError::Parse(message) => write!(f, "config parse error: {message}"),
            ConfigError::Serialize(message) => write!(f, "config serialize error: {message}"),
            ConfigError::Invalid(errors) => write!(f, "invalid config: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl GameConfig {
    pub fn parse_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Serialize(err.to_string()))
    }

    /// Reads and parses a config file. Validation is left to the caller.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::parse_toml(&text)
    }

    /// Reads, parses and validates; warnings are dropped.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        let validation = config.validate();
        if !validation.is_ok() {
            return Err(ConfigError::Invalid(validation.errors));
        }
        Ok(config)
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            bands: self.surface,
            proximity: self.proximity.clone(),
            player: self.player.clone(),
            control: self.control.clone(),
            shape: self.body.clone(),
        }
    }

    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::default();
        if self.version != CONFIG_VERSION {
            validation
                .errors
                .push(format!("unsupported version {}", self.version));
        }
        validate_surface(&self.surface, &mut validation);
        validate_proximity(&self.proximity, &mut validation);
        validate_player(&self.player, &mut validation);
        validate_control(&self.control, &mut validation);
        validate_camera(&self.camera, &mut validation);
        validate_body(&self.body, &mut validation);
        validate_lattice(&self.lattice, &mut validation);
        validation
    }
}

fn check_non_negative(name: &str, value: f32, validation: &mut ConfigValidation) {
    if !value.is_finite() || value < 0.0 {
        validation.errors.push(format!("{name} must be >= 0"));
    }
}

fn check_positive(name: &str, value: f32, validation: &mut ConfigValidation) {
    if !value.is_finite() || value <= 0.0 {
        validation.errors.push(format!("{name} must be > 0"));
    }
}

fn check_angle(name: &str, value: f32, validation: &mut ConfigValidation) {
    if !value.is_finite() || !(0.0..=180.0).contains(&value) {
        validation
            .errors
            .push(format!("{name} must be between 0 and 180"));
    }
}

fn validate_surface(bands: &SurfaceBands, validation: &mut ConfigValidation) {
    check_angle("surface.max_ground_angle_deg", bands.max_ground_angle_deg, validation);
    check_angle("surface.min_wall_angle_deg", bands.min_wall_angle_deg, validation);
    check_angle("surface.max_wall_angle_deg", bands.max_wall_angle_deg, validation);
    check_angle("surface.min_ceiling_angle_deg", bands.min_ceiling_angle_deg, validation);
    check_non_negative("surface.coyote_time", bands.coyote_time, validation);
    if bands.min_wall_angle_deg > bands.max_wall_angle_deg {
        validation
            .errors
            .push("surface wall band is empty (min > max)".to_string());
    }
    if bands.max_ground_angle_deg > bands.min_wall_angle_deg
        || bands.max_wall_angle_deg > bands.min_ceiling_angle_deg
    {
        validation
            .warnings
            .push("surface bands overlap; one contact may update several surfaces".to_string());
    }
}

fn validate_curve(name: &str, curve: &WeightedCurve, validation: &mut ConfigValidation) {
    if !curve.weight.is_finite() || !(0.0..=1.0).contains(&curve.weight) {
        validation
            .errors
            .push(format!("{name}.weight must be between 0 and 1"));
    }
    let keys = curve.curve.keys();
    if keys.is_empty() {
        validation
            .warnings
            .push(format!("{name} has no keys and always evaluates to 0"));
    }
    let finite = keys.iter().all(|key| {
        key.time.is_finite()
            && key.value.is_finite()
            && key.in_tangent.is_finite()
            && key.out_tangent.is_finite()
    });
    if !finite {
        validation
            .errors
            .push(format!("{name} has non-finite keys"));
    }
}

fn validate_proximity(config: &ProximityConfig, validation: &mut ConfigValidation) {
    check_positive("proximity.range", config.range, validation);
    if config.sample_count < proximity_field::MIN_SAMPLE_COUNT {
        validation.warnings.push(format!(
            "proximity.sample_count {} is raised to {}",
            config.sample_count,
            proximity_field::MIN_SAMPLE_COUNT
        ));
    }
    validate_curve("proximity.speed", &config.speed, validation);
    validate_curve("proximity.angle", &config.angle, validation);
    validate_curve("proximity.proximity", &config.proximity, validation);
}

fn validate_player(player: &PlayerConfig, validation: &mut ConfigValidation) {
    if player.grapple_spawns < 1 {
        validation
            .errors
            .push("player.grapple_spawns must be >= 1".to_string());
    }
    for (name, value) in [
        ("player.grapple_speed", player.grapple_speed),
        ("player.grapple_force", player.grapple_force),
        ("player.jetpack_force", player.jetpack_force),
        ("player.walk_move_force", player.walk_move_force),
        ("player.jump_force", player.jump_force),
        ("player.max_jump_time", player.max_jump_time),
        ("player.walk_drag", player.walk_drag),
        ("player.air_drag", player.air_drag),
        ("player.jet_drag", player.jet_drag),
        ("player.stationary_friction_speed", player.stationary_friction_speed),
        ("player.rotation_smoothing", player.rotation_smoothing),
        ("player.high_friction", player.high_friction),
        ("player.no_friction", player.no_friction),
    ] {
        check_non_negative(name, value, validation);
    }
    if player.no_friction > player.high_friction {
        validation
            .warnings
            .push("player.no_friction is larger than player.high_friction".to_string());
    }
    if !player.grapple_nozzle.iter().all(|value| value.is_finite()) {
        validation
            .errors
            .push("player.grapple_nozzle must be finite".to_string());
    }
}

fn validate_control(control: &ControlConfig, validation: &mut ConfigValidation) {
    if !control.mouse_sensitivity.is_finite() || control.mouse_sensitivity < 0.1 {
        validation
            .errors
            .push("control.mouse_sensitivity must be >= 0.1".to_string());
    }
    if !control.pitch_margin_deg.is_finite() || !(0.0..90.0).contains(&control.pitch_margin_deg) {
        validation
            .errors
            .push("control.pitch_margin_deg must be in [0, 90)".to_string());
    }
}

fn validate_camera(camera: &CameraConfig, validation: &mut ConfigValidation) {
    if !camera.fov_base.is_finite() || camera.fov_base <= 0.0 || camera.fov_base >= 180.0 {
        validation
            .errors
            .push("camera.fov_base must be between 0 and 180".to_string());
    }
    check_positive("camera.fov_power_factor", camera.fov_power_factor, validation);
    check_non_negative("camera.fov_smoothing", camera.fov_smoothing, validation);
    check_non_negative("camera.position_smoothing", camera.position_smoothing, validation);
    if camera.fov_power_factor < 1.0 {
        validation
            .warnings
            .push("camera.fov_power_factor < 1 narrows the view with speed".to_string());
    }
}

fn validate_body(body: &BodyShape, validation: &mut ConfigValidation) {
    check_positive("body.capsule_radius", body.capsule_radius, validation);
    check_non_negative("body.capsule_half_height", body.capsule_half_height, validation);
    check_positive("body.density", body.density, validation);
    check_positive("body.projectile_radius", body.projectile_radius, validation);
}

fn validate_lattice(lattice: &LatticeConfig, validation: &mut ConfigValidation) {
    for (axis, count) in lattice.dims.iter().enumerate() {
        if !(1..=MAX_AXIS_POINTS).contains(count) {
            validation.errors.push(format!(
                "lattice.dims[{axis}] must be between 1 and {MAX_AXIS_POINTS}"
            ));
        }
    }
    if !lattice.factor.is_finite() || !(0.0..=1.0).contains(&lattice.factor) {
        validation
            .errors
            .push("lattice.factor must be between 0 and 1".to_string());
    }
    if lattice.size.iter().any(|extent| !extent.is_finite() || *extent == 0.0) {
        validation
            .errors
            .push("lattice.size must be finite and non-zero".to_string());
    }
    for point in &lattice.points {
        let in_range = point
            .index
            .iter()
            .zip(lattice.dims.iter())
            .all(|(index, count)| index < count);
        if !in_range {
            validation.errors.push(format!(
                "lattice point {:?} is outside dims {:?}",
                point.index, lattice.dims
            ));
        }
    }
}
