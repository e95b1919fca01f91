use std::env;
use std::error::Error;
use std::process::ExitCode;

use probefp::config::LoggingYamlConfig;
use probefp::{FingerprintDatabase, ProbeFpConfig, QueryRecording, replay};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingYamlConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(config_path: &str, recording_path: &str) -> Result<(), Box<dyn Error>> {
    let config = ProbeFpConfig::from_file(config_path)?;
    init_tracing(&config.logging);

    let index_cfg = config.index_config();
    let db = match &config.index.cache_path {
        Some(path) => FingerprintDatabase::load_or_empty(index_cfg, path)?,
        None => FingerprintDatabase::new(index_cfg)?,
    };
    let recording = QueryRecording::load(recording_path)?;
    let results = replay(&db, config.match_config(), &recording)?;

    println!("rank\tmodel\tname\tscore\tmatches\tprobe%\tquery%\torientation");
    for (rank, hit) in results.iter().enumerate() {
        println!(
            "{}\t{}\t{}\t{:.4}\t{}\t{:.3}\t{:.3}\t{}",
            rank + 1,
            hit.model_id,
            db.name(hit.local_id).unwrap_or("-"),
            hit.score,
            hit.num_matches,
            hit.probe_match_percentage,
            hit.query_match_percentage,
            hit.placement
                .map_or_else(|| "-".to_string(), |p| p.orientation.to_string()),
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let [_, config_path, recording_path] = args.as_slice() else {
        eprintln!("usage: probefp <config.yaml> <query-recording>");
        return ExitCode::from(2);
    };
    match run(config_path, recording_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
