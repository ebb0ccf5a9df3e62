//! Hygrothermal identification CLI - Check configurations against measurements.

use std::fs;
use std::path::PathBuf;

use hygro_iden::{
    compute::{MeasurementTable, SensorObservations, identification::ParameterSchema},
    schema::IdentificationConfig,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 4 || args[1] != "check" {
        eprintln!("Usage: {} check <config.json> <measurements.txt>", args[0]);
        eprintln!("       {} --example", args[0]);
        eprintln!();
        eprintln!("Validate an identification configuration and bind its sensors");
        eprintln!("to a tab-delimited measurement file.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json       Path to identification configuration file");
        eprintln!("  measurements.txt  Tab-delimited measurements with a header row");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[2]);
    let measurements_path = PathBuf::from(&args[3]);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: IdentificationConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let schema = ParameterSchema::new(&config.materials).unwrap_or_else(|e| {
        eprintln!("Invalid search space: {}", e);
        std::process::exit(1);
    });

    // Load measurements
    let table = MeasurementTable::load(&measurements_path).unwrap_or_else(|e| {
        eprintln!("Error loading measurements: {}", e);
        std::process::exit(1);
    });

    let observations = SensorObservations::bind(&config.sensors, &table).unwrap_or_else(|e| {
        eprintln!("Error binding sensors: {}", e);
        std::process::exit(1);
    });

    println!("Hygrothermal Identification");
    println!("===========================");
    println!(
        "Population: {} (sigma {})",
        config.strategy.population_size, config.strategy.initial_sigma
    );
    println!(
        "Termination: {} generations or dispersion < {:e}",
        config.termination.max_generations, config.termination.dispersion_threshold
    );
    println!("Regularization weight: {}", config.regularization.weight);
    println!();

    println!("Search space ({} parameters):", schema.dimension());
    for slot in schema.slots() {
        println!(
            "  material {} -> indices {}..{}",
            slot.material, slot.indices.start, slot.indices.end
        );
        for bound in &slot.parameters {
            println!("    {:<10} [{:e}, {:e}]", bound.name, bound.low, bound.high);
        }
    }
    println!();

    println!(
        "Measurements: {} samples, t = {} .. {} s",
        observations.sample_count(),
        observations.times.first().copied().unwrap_or_default(),
        observations.times.last().copied().unwrap_or_default()
    );
    for (channel, sensors) in [
        ("temperature", &observations.temperature),
        ("humidity", &observations.humidity),
        ("heat flux", &observations.flux),
    ] {
        for sensor in &sensors.sensors {
            println!(
                "  {:<12} {:<12} x = {:<6} weight {:e}",
                channel, sensor.label, sensor.location, sensor.weight
            );
        }
    }
}

fn print_example_config() {
    let config = IdentificationConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
