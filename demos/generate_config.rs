//! Generate the default calibration configuration file
//!
//! Creates a JSON config with all default parameters

use colorsense::CalibrationConfig;
use std::{env, path::Path, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <output_config.json>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} device/calibration.json", args[0]);
        process::exit(1);
    }

    let output_path = Path::new(&args[1]);

    if let Some(parent) = output_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error creating directory: {}", e);
            process::exit(1);
        }
    }

    let config = CalibrationConfig::default();

    match config.to_json_file(output_path) {
        Ok(_) => {
            eprintln!("Configuration saved to {}", output_path.display());
            eprintln!();
            eprintln!("Config summary:");
            eprintln!(
                "  Solver: {} points, condition ≤ {:.0}, |det| ≥ {:.0e}",
                config.solver.min_matrix_points,
                config.solver.max_condition_number,
                config.solver.determinant_epsilon
            );
            eprintln!(
                "  Diversity: target range ≥ {}, raw range ≥ {}",
                config.solver.min_target_range, config.solver.min_raw_range
            );
            eprintln!(
                "  Sampling: {} reads, {} ms apart, {} ms dark settle",
                config.sampling.sample_count,
                config.sampling.settle_delay_ms,
                config.sampling.dark_settle_delay_ms
            );
            eprintln!(
                "  IR compensation: {:.2} / {:.2}",
                config.ir_compensation.factor1, config.ir_compensation.factor2
            );
        }
        Err(e) => {
            eprintln!("Error saving config: {}", e);
            process::exit(1);
        }
    }
}
