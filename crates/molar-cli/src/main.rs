//! molar CLI - voxelize meshes, drive carving runs and score preparations.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use molar::{CollisionReport, Mesh, Simulation, SimulationConfig, Tool};
use molar_grid::GridSnapshot;
use molar_math::{Point3, Transform};

mod import;

#[derive(Parser)]
#[command(name = "molar")]
#[command(about = "Voxel tooth carving: voxelize, carve, evaluate", long_about = None)]
struct Cli {
    /// TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Voxelize an .obj or .stl mesh into a .vox grid
    Voxelize {
        /// Input mesh
        mesh: PathBuf,
        /// Output grid
        output: PathBuf,
        /// Voxels along the longest axis (overrides the config)
        #[arg(short, long)]
        resolution: Option<usize>,
        /// Blur passes (overrides the config)
        #[arg(short, long)]
        smoothing: Option<usize>,
    },
    /// Display information about a .vox grid
    Info {
        /// Path to the grid
        file: PathBuf,
    },
    /// Run carving steps with one tool and save the result
    Carve {
        /// Grid to carve
        input: PathBuf,
        /// Tool shape
        #[arg(long, value_enum, default_value = "sphere")]
        tool: ToolShape,
        /// Tool position in world units, relative to the grid centre
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        at: Point3,
        /// Tool movement per step
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        feed: Option<Point3>,
        /// Trigger pressure in [0, 1]
        #[arg(long, default_value_t = 1.0)]
        trigger: f32,
        /// Number of steps
        #[arg(long, default_value_t = 1)]
        steps: usize,
        /// Output grid (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also export the final surface (.obj or .stl)
        #[arg(long)]
        mesh: Option<PathBuf>,
    },
    /// Score a carved grid against its pristine original
    Evaluate {
        /// Uncarved grid
        initial: PathBuf,
        /// Carved grid
        current: PathBuf,
        /// Tooth shape from the config's shape table
        #[arg(long, default_value = "molar")]
        shape: String,
        /// Write overlay meshes as <prefix>-errors.obj, -carved.obj and -margin.obj
        #[arg(long)]
        overlays: Option<PathBuf>,
    },
    /// Export the surface of a .vox grid
    Export {
        /// Input grid
        input: PathBuf,
        /// Output file (format determined by extension: .obj, .stl)
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ToolShape {
    Sphere,
    Capsule,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match &cli.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimulationConfig::default(),
    };

    match cli.command {
        Commands::Voxelize {
            mesh,
            output,
            resolution,
            smoothing,
        } => {
            let mut config = config;
            if let Some(r) = resolution {
                config.voxelizer.resolution = r;
            }
            if let Some(s) = smoothing {
                config.voxelizer.smoothing_passes = s;
            }
            voxelize(config, &mesh, &output)?;
        }
        Commands::Info { file } => {
            show_info(&file)?;
        }
        Commands::Carve {
            input,
            tool,
            at,
            feed,
            trigger,
            steps,
            output,
            mesh,
        } => {
            let run = CarveRun {
                tool,
                at,
                feed: feed.unwrap_or_else(Point3::origin),
                trigger,
                steps,
            };
            let output = output.unwrap_or_else(|| input.clone());
            carve(config, &input, &output, mesh.as_deref(), &run)?;
        }
        Commands::Evaluate {
            initial,
            current,
            shape,
            overlays,
        } => {
            evaluate(&config, &initial, &current, &shape, overlays.as_deref())?;
        }
        Commands::Export { input, output } => {
            export_surface(config, &input, &output)?;
        }
    }

    Ok(())
}

fn parse_point(s: &str) -> std::result::Result<Point3, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z, got {s:?}"));
    }
    let mut xyz = [0.0f32; 3];
    for (slot, part) in xyz.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("bad coordinate {part:?}"))?;
    }
    Ok(Point3::new(xyz[0], xyz[1], xyz[2]))
}

fn simulation(config: SimulationConfig) -> Result<Simulation> {
    #[cfg(feature = "gpu")]
    {
        if config.backend == molar::BackendKind::Gpu {
            let ctx = molar_gpu::GpuContext::new_blocking().context("opening GPU device")?;
            return Ok(Simulation::with_gpu(config, std::sync::Arc::new(ctx))?);
        }
    }
    Ok(Simulation::new(config)?)
}

fn voxelize(config: SimulationConfig, mesh_path: &Path, output: &Path) -> Result<()> {
    let mesh = import::load_mesh(mesh_path)?;
    println!(
        "Loaded {} triangles from {}",
        mesh.num_triangles(),
        mesh_path.display()
    );
    let sim = simulation(config)?;
    let tooth = sim.voxelize(mesh, Point3::origin()).wait(&sim)?;
    tooth.save(output)?;
    println!(
        "Wrote {} grid (voxel size {}) to {}",
        tooth.dims(),
        tooth.voxel_size(),
        output.display()
    );
    Ok(())
}

fn show_info(path: &Path) -> Result<()> {
    let snapshot =
        GridSnapshot::load(path).with_context(|| format!("reading {}", path.display()))?;
    let dims = snapshot.dims();
    let solid = snapshot.density.count_above(0.0);
    println!("Grid: {}", path.display());
    println!("  Dimensions: {dims}");
    println!("  Voxel size: {}", snapshot.voxel_size);
    println!(
        "  Extent: {:.4} x {:.4} x {:.4}",
        dims.x as f32 * snapshot.voxel_size,
        dims.y as f32 * snapshot.voxel_size,
        dims.z as f32 * snapshot.voxel_size
    );
    println!(
        "  Solid voxels: {solid} ({:.1}%)",
        100.0 * solid as f64 / dims.volume() as f64
    );
    if let Some((min, max)) = snapshot.density.min_max() {
        println!("  Density range: [{min}, {max}]");
    }
    Ok(())
}

struct CarveRun {
    tool: ToolShape,
    at: Point3,
    feed: Point3,
    trigger: f32,
    steps: usize,
}

impl CarveRun {
    fn tool_at(&self, sim: &Simulation, step: usize) -> Tool {
        let p = self.at + self.feed.coords * step as f32;
        let tools = &sim.config().tools;
        match self.tool {
            ToolShape::Sphere => tools.sphere(p, self.trigger),
            ToolShape::Capsule => tools.capsule(Transform::translation(p.x, p.y, p.z), self.trigger),
        }
    }
}

fn carve(
    config: SimulationConfig,
    input: &Path,
    output: &Path,
    mesh_out: Option<&Path>,
    run: &CarveRun,
) -> Result<()> {
    let sim = simulation(config)?;
    let mut tooth = sim
        .load_tooth(input, Point3::origin())
        .with_context(|| format!("loading {}", input.display()))?;

    let mut collided_steps = 0;
    let mut haptics = |report: &CollisionReport| {
        log::debug!(
            "collision: {} voxels, intensity {:.3}",
            report.flagged,
            report.intensity
        );
        collided_steps += 1;
    };
    let mut triangles = 0;
    for step in 0..run.steps {
        let tool = run.tool_at(&sim, step);
        let report = tooth.step(&[tool], &mut haptics)?;
        triangles = report.mesh.triangles;
    }
    drop(haptics);

    println!(
        "Ran {} steps on {} backend: {} with contact, surface has {triangles} triangles",
        run.steps,
        tooth.backend_name(),
        collided_steps
    );

    tooth.save(output)?;
    println!("Saved carved grid to {}", output.display());
    if let Some(path) = mesh_out {
        write_mesh(&tooth.mesh()?, path)?;
    }
    Ok(())
}

fn evaluate(
    config: &SimulationConfig,
    initial: &Path,
    current: &Path,
    shape: &str,
    overlays: Option<&Path>,
) -> Result<()> {
    let initial = GridSnapshot::load(initial)
        .with_context(|| format!("reading {}", initial.display()))?;
    let current = GridSnapshot::load(current)
        .with_context(|| format!("reading {}", current.display()))?;
    if initial.dims() != current.dims() {
        bail!(
            "grids differ in size: {} vs {}",
            initial.dims(),
            current.dims()
        );
    }
    let params = config.evaluation.parameters(shape, initial.dims())?;
    let result = molar_eval::evaluate(
        &initial.density,
        &current.density,
        &params,
        initial.voxel_size,
    )?;

    println!("Evaluation ({shape}, preparation starts at layer {}):", params.start_y);
    println!("  Score: {:.0}", result.score);
    println!("  Undercuts: {}", result.undercut_count);
    println!("  Error voxels: {}", result.error_voxels());
    println!("  Carved voxels: {}", result.carved_voxels());

    if let Some(prefix) = overlays {
        let meshes = molar::overlay_meshes(
            &result,
            &current.density,
            config.builder.isovalue,
            initial.voxel_size,
            config.builder.triangle_budget,
        )?;
        for (suffix, mesh) in [
            ("errors", &meshes.errors),
            ("carved", &meshes.carved_area),
            ("margin", &meshes.margin),
        ] {
            let mut name = prefix.as_os_str().to_owned();
            name.push(format!("-{suffix}.obj"));
            write_mesh(mesh, Path::new(&name))?;
        }
    }
    Ok(())
}

fn export_surface(config: SimulationConfig, input: &Path, output: &Path) -> Result<()> {
    let sim = simulation(config)?;
    let tooth = sim
        .load_tooth(input, Point3::origin())
        .with_context(|| format!("loading {}", input.display()))?;
    write_mesh(&tooth.mesh()?, output)
}

fn write_mesh(mesh: &Mesh, path: &Path) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext.to_lowercase().as_str() {
        "obj" => {
            let file = fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            molar_isosurface::export::write_obj(mesh, std::io::BufWriter::new(file))?;
        }
        "stl" => {
            fs::write(path, molar_isosurface::export::stl_bytes(mesh))?;
        }
        _ => bail!("Unknown output format: {}", ext),
    }
    println!(
        "Exported {} triangles to {}",
        mesh.num_triangles(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("1, -2.5,3").unwrap(), Point3::new(1.0, -2.5, 3.0));
        assert!(parse_point("1,2").is_err());
        assert!(parse_point("1,x,3").is_err());
    }

    #[test]
    fn test_cli_parses_carve() {
        let cli = Cli::try_parse_from([
            "molar", "carve", "tooth.vox", "--tool", "capsule", "--at", "0,0.5,0", "--feed",
            "0,-0.01,0", "--steps", "20",
        ])
        .unwrap();
        match cli.command {
            Commands::Carve { at, feed, steps, .. } => {
                assert_eq!(at, Point3::new(0.0, 0.5, 0.0));
                assert_eq!(feed, Some(Point3::new(0.0, -0.01, 0.0)));
                assert_eq!(steps, 20);
            }
            _ => panic!("expected carve"),
        }
    }

    #[test]
    fn test_carve_run_feeds_tool() {
        let sim = Simulation::new(SimulationConfig::default()).unwrap();
        let run = CarveRun {
            tool: ToolShape::Sphere,
            at: Point3::new(0.0, 1.0, 0.0),
            feed: Point3::new(0.0, -0.25, 0.0),
            trigger: 1.0,
            steps: 4,
        };
        assert_eq!(run.tool_at(&sim, 2).position(), Point3::new(0.0, 0.5, 0.0));
    }
}
