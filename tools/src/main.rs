use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use engine_core::logging;
use game_config::{ConfigError, GameConfig};
use physics_rapier::PhysicsWorld;
use player_camera::FollowCamera;
use player_controller::{DirectInputAdapter, PlayerController, RawInput};
use rapier3d::math::{Point, Vector};
use rapier3d::prelude::{ColliderBuilder, Real};

const EXIT_SUCCESS: i32 = 0;
const EXIT_USAGE: i32 = 2;
const EXIT_CONFIG_READ: i32 = 10;
const EXIT_CONFIG_INVALID: i32 = 11;

const SMOKE_DT: Real = 1.0 / 60.0;

#[derive(Parser)]
#[command(name = "tools", version, about = "Bolt movement tools CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a game config file.
    ValidateConfig {
        #[arg(long, value_name = "PATH")]
        path: PathBuf,
    },
    /// Print Fibonacci sphere sample directions.
    Directions(DirectionsArgs),
    /// Run points through the configured lattice.
    Deform(DeformArgs),
    /// Headless character-on-a-floor simulation.
    Smoke(SmokeArgs),
}

#[derive(Parser)]
struct DirectionsArgs {
    #[arg(long)]
    count: usize,

    /// Fraction of the sphere to cover, from the pole downward.
    #[arg(long)]
    occupied: Option<Real>,
}

#[derive(Parser)]
struct DeformArgs {
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long = "points", value_name = "X,Y,Z", num_args = 1.., value_parser = parse_point, required = true)]
    points: Vec<[Real; 3]>,
}

#[derive(Parser)]
struct SmokeArgs {
    #[arg(long)]
    ticks: Option<u32>,

    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Hold forward for the whole run.
    #[arg(long)]
    walk: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::ValidateConfig { path } => run_validate(&path),
        Commands::Directions(args) => run_directions(args),
        Commands::Deform(args) => run_deform(args),
        Commands::Smoke(args) => run_smoke(args),
    };
    std::process::exit(exit_code);
}

fn parse_point(text: &str) -> Result<[Real; 3], String> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z but got '{text}'"));
    }
    let mut point = [0.0; 3];
    for (slot, part) in point.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|err| format!("invalid coordinate '{part}': {err}"))?;
    }
    Ok(point)
}

fn config_exit_code(err: &ConfigError) -> i32 {
    match err {
        ConfigError::Invalid(_) => EXIT_CONFIG_INVALID,
        _ => EXIT_CONFIG_READ,
    }
}

/// Loads and validates `path`, or returns defaults when no path is given.
fn load_config(path: Option<&Path>) -> Result<GameConfig, i32> {
    let Some(path) = path else {
        return Ok(GameConfig::default());
    };
    let config = GameConfig::load(path).map_err(|err| {
        eprintln!("{err}");
        config_exit_code(&err)
    })?;
    let validation = config.validate();
    for warning in &validation.warnings {
        logging::warn("config", warning);
    }
    if !validation.is_ok() {
        for error in &validation.errors {
            eprintln!("config error: {error}");
        }
        return Err(EXIT_CONFIG_INVALID);
    }
    Ok(config)
}

fn run_validate(path: &Path) -> i32 {
    match load_config(Some(path)) {
        Ok(_) => {
            println!("config ok: {}", path.display());
            EXIT_SUCCESS
        }
        Err(code) => code,
    }
}

fn run_directions(args: DirectionsArgs) -> i32 {
    let directions = match args.occupied {
        Some(amount) if !(0.0..=1.0).contains(&amount) => {
            eprintln!("--occupied must be between 0 and 1");
            return EXIT_USAGE;
        }
        Some(amount) => proximity_field::fibonacci_directions_partial(args.count, amount),
        None => proximity_field::fibonacci_directions(args.count),
    };
    for direction in &directions {
        println!("{:.6} {:.6} {:.6}", direction.x, direction.y, direction.z);
    }
    EXIT_SUCCESS
}

fn run_deform(args: DeformArgs) -> i32 {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let lattice = match config.lattice.build() {
        Ok(lattice) => lattice,
        Err(err) => {
            eprintln!("lattice: {err}");
            return EXIT_CONFIG_INVALID;
        }
    };
    let points: Vec<Point<Real>> = args.points.iter().map(|p| Point::from(*p)).collect();
    let Some(deformed) = ffd::deformed(&lattice.snapshot(), &points, &config.lattice.mesh_to_lattice())
    else {
        eprintln!("lattice transform is singular");
        return EXIT_CONFIG_INVALID;
    };
    for (before, after) in points.iter().zip(&deformed) {
        println!(
            "{:.4},{:.4},{:.4} -> {:.4},{:.4},{:.4}",
            before.x, before.y, before.z, after.x, after.y, after.z
        );
    }
    EXIT_SUCCESS
}

fn run_smoke(args: SmokeArgs) -> i32 {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let ticks = args.ticks.unwrap_or(120);

    let mut world = PhysicsWorld::new(Vector::new(0.0, -9.81, 0.0));
    let floor = ColliderBuilder::cuboid(50.0, 0.1, 50.0)
        .translation(Vector::new(0.0, -0.1, 0.0))
        .build();
    world.insert_static_collider(floor);
    world.step(SMOKE_DT);

    let mut player = PlayerController::spawn(
        &mut world,
        DirectInputAdapter,
        config.player_settings(),
        Point::new(0.0, 2.0, 0.0),
        Vector::z(),
    );
    let camera = Rc::new(RefCell::new(FollowCamera::new(
        config.camera.clone(),
        Point::new(0.0, 3.0, -4.0),
    )));
    let follow = Rc::clone(&camera);
    player.add_motion_observer(move |motion| {
        follow.borrow_mut().on_motion(motion);
    });

    let input = RawInput {
        move_y: if args.walk { 1.0 } else { 0.0 },
        ..RawInput::default()
    };
    let mut last = None;
    for _ in 0..ticks {
        match player.tick(&mut world, input, SMOKE_DT) {
            Some(frame) => last = Some(frame),
            None => {
                eprintln!("character body vanished");
                return EXIT_USAGE;
            }
        }
    }

    let pose = camera.borrow().pose();
    match last {
        Some(frame) => println!(
            "smoke ok (ticks={}, position=[{:.3}, {:.3}, {:.3}], grounded={}, wall={}, fov={:.2})",
            ticks,
            frame.position.x,
            frame.position.y,
            frame.position.z,
            player.surfaces().ground().is_contacting(),
            player.surfaces().wall().is_contacting(),
            pose.fov_deg
        ),
        None => println!("smoke ok (ticks=0)"),
    }
    EXIT_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_points() {
        assert_eq!(parse_point("1, 2.5,-3").unwrap(), [1.0, 2.5, -3.0]);
        assert!(parse_point("1,2").is_err());
        assert!(parse_point("1,x,3").is_err());
    }

    #[test]
    fn config_errors_map_to_exit_codes() {
        assert_eq!(
            config_exit_code(&ConfigError::Parse("bad".to_string())),
            EXIT_CONFIG_READ
        );
        assert_eq!(
            config_exit_code(&ConfigError::Invalid(Vec::new())),
            EXIT_CONFIG_INVALID
        );
        assert_eq!(load_config(Some(Path::new("/nonexistent.toml"))).unwrap_err(), EXIT_CONFIG_READ);
    }
}
