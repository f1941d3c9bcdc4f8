//! Run a guided calibration against a simulated sensor
//!
//! Walks the six-color workflow, then prints the active tier, the matrix
//! and the residual error at every reference.
//!
//! Set `RUST_LOG=debug` for solver detail.

use std::cell::Cell;
use std::rc::Rc;
use std::{env, process};

use colorsense::calibration::AutoCalibrationState;
use colorsense::hardware::{AveragingSensor, SampleSource};
use colorsense::storage::{JsonFileStore, KeyValueStore, MemoryStore};
use colorsense::{
    CalibrationColor, CalibrationManager, Illumination, IrReading, RawReading, Result, RgbColor,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

/// Channel crosstalk of the simulated sensor
const CROSSTALK: [[f32; 3]; 3] = [[0.6, 0.25, 0.1], [0.3, 0.6, 0.1], [0.05, 0.15, 0.7]];
const DARK_CURRENT: u16 = 80;

/// Shared state between the simulated LED and the simulated sample under the sensor
#[derive(Clone)]
struct Bench {
    brightness: Rc<Cell<u8>>,
    sample: Rc<Cell<RgbColor>>,
}

struct SimulatedSource {
    bench: Bench,
    rng: StdRng,
}

impl SampleSource for SimulatedSource {
    fn read_sample(&mut self) -> Result<IrReading> {
        let bench = &self.bench;
        let noise: f32 = self.rng.gen_range(0.0..7.0);

        let light = f32::from(bench.brightness.get()) / 255.0;
        let sample = bench.sample.get();
        let rgb = [sample.r, sample.g, sample.b].map(|c| f32::from(c) / 255.0);
        let [x, y, z] = CROSSTALK.map(|row| {
            let signal = (row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]) * light * 65535.0;
            (signal + f32::from(DARK_CURRENT) + noise).clamp(0.0, 65535.0) as u16
        });
        Ok(IrReading::new(x, y, z, 40, 25))
    }
}

struct SimulatedLed(Bench);

impl Illumination for SimulatedLed {
    fn brightness(&self) -> u8 {
        self.0.brightness.get()
    }

    fn set_brightness(&mut self, level: u8) -> Result<()> {
        self.0.brightness.set(level);
        Ok(())
    }
}

fn run<K: KeyValueStore>(bench: Bench, store: K) -> Result<()> {
    let source = SimulatedSource {
        bench: bench.clone(),
        rng: StdRng::seed_from_u64(7),
    };
    let sensor = AveragingSensor::new(source, 10, std::time::Duration::ZERO);
    let mut manager = CalibrationManager::new(sensor, SimulatedLed(bench.clone()), store);
    manager.initialize()?;

    manager.start_auto_calibration()?;
    while manager.auto_calibration_status().state == AutoCalibrationState::InProgress {
        let status = manager.auto_calibration_status();
        println!("[{}/{}] {}", status.step_index + 1, status.total_steps, status.instructions);
        // The operator presents the requested sample
        bench.sample.set(status.target);
        manager.auto_calibration_next()?;
    }

    println!();
    println!("Active tier: {}", manager.active_tier().name());
    let matrix = manager.matrix();
    for row in matrix.m {
        println!("  [{:>8.4} {:>8.4} {:>8.4}]", row[0], row[1], row[2]);
    }
    println!(
        "  det {:.4}, condition {:.2}",
        matrix.determinant, matrix.condition_number
    );

    let report = manager.accuracy_report();
    println!();
    println!("{:<8} {:>9} {:>9} {:>6}", "color", "target", "measured", "ΔE");
    for (color, residual) in CalibrationColor::SEQUENCE.iter().zip(&report.residuals) {
        println!(
            "{:<8} {:>9} {:>9} {:>6.2}",
            color.reference().name,
            residual.target.hex(),
            residual.corrected.hex(),
            residual.delta_e
        );
    }
    println!("mean ΔE {:.2}, max ΔE {:.2}", report.mean_delta_e, report.max_delta_e);

    let mid_grey = RawReading::new(22750, 25300, 17700);
    let correction = manager.correct(mid_grey);
    println!();
    println!("{:?} -> {} via {:?}", mid_grey, correction.rgb.hex(), correction.method);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bench = Bench {
        brightness: Rc::new(Cell::new(200)),
        sample: Rc::new(Cell::new(RgbColor::BLACK)),
    };

    let result = match env::args().nth(1) {
        Some(path) => JsonFileStore::open(&path).and_then(|store| run(bench, store)),
        None => run(bench, MemoryStore::new()),
    };

    if let Err(e) = result {
        eprintln!("Calibration failed: {}", e.user_message());
        eprintln!("  {}", e);
        process::exit(1);
    }
}
