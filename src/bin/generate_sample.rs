//! Write a deterministic synthetic exoplanet catalog.
//!
//! Usage: `generate_sample [--rows N] [--parquet] [OUT]`
//! (default: 2000 planets to `uploads/default.csv`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use exoviz::data::sample::Mt19937;
use parquet::arrow::ArrowWriter;

/// Numeric columns after the identity columns, in output order.
const NUMERIC_COLUMNS: [&str; 13] = [
    "distance_pc",
    "right_ascens",
    "declination",
    "period",
    "trans_duration",
    "trans_depth",
    "planet_radius",
    "planet_insolation",
    "planet_temp",
    "stellar_temp",
    "stellar_logg",
    "stellar_radius",
    "stellar_mass",
];

struct Planet {
    star_name: String,
    planet_name: String,
    /// One entry per `NUMERIC_COLUMNS`.
    values: [Option<f64>; 13],
}

struct Star {
    name: String,
    distance_pc: f64,
    ra: f64,
    dec: f64,
    temp: f64,
    logg: f64,
    radius: f64,
    mass: f64,
}

fn random_star(index: usize, rng: &mut Mt19937) -> Star {
    // Log-uniform distance: 5 to 2,000 pc, isotropic sky position
    let distance_pc = 5.0 * 400f64.powf(rng.next_f64());
    let ra = rng.next_f64() * 360.0;
    let dec = (rng.next_f64() * 2.0 - 1.0).asin().to_degrees();

    let mass = (rng.gauss(1.0, 0.3)).clamp(0.1, 3.0);
    let radius = mass.powf(0.8) * rng.gauss(1.0, 0.05).abs();
    let temp = 5778.0 * mass.powf(0.55) + rng.gauss(0.0, 150.0);
    let logg = 4.44 + (mass / radius.powi(2)).log10();

    Star {
        name: format!("SYN-{index:05}"),
        distance_pc,
        ra,
        dec,
        temp,
        logg,
        radius,
        mass,
    }
}

fn random_planet(star: &Star, letter: char, rng: &mut Mt19937) -> Planet {
    let period = 10f64.powf(rng.next_f64() * 3.0);
    let planet_radius = 0.5 + rng.next_f64().powi(2) * 15.0;
    let trans_depth = (planet_radius / (star.radius * 109.1)).powi(2) * 1e6;
    let trans_duration = 13.0 * (period / 365.0).powf(1.0 / 3.0) * star.radius;

    let a_au = (star.mass * (period / 365.25).powi(2)).cbrt();
    let luminosity = star.radius.powi(2) * (star.temp / 5778.0).powi(4);
    let insolation = luminosity / a_au.powi(2);
    let planet_temp = 278.0 * insolation.powf(0.25);

    // Some catalog rows lack equilibrium temperature and insolation.
    let measured = rng.next_f64() > 0.05;

    Planet {
        star_name: star.name.clone(),
        planet_name: format!("{} {letter}", star.name),
        values: [
            Some(star.distance_pc),
            Some(star.ra),
            Some(star.dec),
            Some(period),
            Some(trans_duration),
            Some(trans_depth),
            Some(planet_radius),
            measured.then_some(insolation),
            measured.then_some(planet_temp),
            Some(star.temp),
            Some(star.logg),
            Some(star.radius),
            Some(star.mass),
        ],
    }
}

fn generate(rows: usize, rng: &mut Mt19937) -> Vec<Planet> {
    let mut planets = Vec::with_capacity(rows);
    let mut star_index = 0;
    while planets.len() < rows {
        let star = random_star(star_index, rng);
        star_index += 1;
        let count = 1 + rng.random_interval(3) as usize;
        for letter in ('b'..='z').take(count) {
            if planets.len() == rows {
                break;
            }
            planets.push(random_planet(&star, letter, rng));
        }
    }
    planets
}

fn write_csv(planets: &[Planet], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    let mut header = vec!["star_name", "planet_name"];
    header.extend(NUMERIC_COLUMNS);
    writer.write_record(&header)?;

    for planet in planets {
        let mut record = vec![planet.star_name.clone(), planet.planet_name.clone()];
        record.extend(
            planet
                .values
                .iter()
                .map(|v| v.map(|v| format!("{v:.6}")).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(planets: &[Planet], path: &Path) -> Result<()> {
    let mut fields = vec![
        Field::new("star_name", DataType::Utf8, false),
        Field::new("planet_name", DataType::Utf8, false),
    ];
    fields.extend(
        NUMERIC_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, true)),
    );
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            planets.iter().map(|p| p.star_name.as_str()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            planets.iter().map(|p| p.planet_name.as_str()).collect::<Vec<_>>(),
        )),
    ];
    for col in 0..NUMERIC_COLUMNS.len() {
        let values: Vec<Option<f64>> = planets.iter().map(|p| p.values[col]).collect();
        arrays.push(Arc::new(Float64Array::from(values)));
    }

    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;
    let file = std::fs::File::create(path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rows = 2000usize;
    let mut parquet = false;
    let mut output: Option<PathBuf> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--rows" => {
                let n = args.next().context("--rows needs a value")?;
                rows = n.parse().with_context(|| format!("invalid row count '{n}'"))?;
            }
            "--parquet" => parquet = true,
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            path => output = Some(PathBuf::from(path)),
        }
    }
    let output = output.unwrap_or_else(|| {
        PathBuf::from(if parquet { "uploads/default.parquet" } else { "uploads/default.csv" })
    });
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut rng = Mt19937::new(42);
    let planets = generate(rows, &mut rng);
    if parquet {
        write_parquet(&planets, &output)?;
    } else {
        write_csv(&planets, &output)?;
    }

    println!("Wrote {} planets to {}", planets.len(), output.display());
    Ok(())
}
