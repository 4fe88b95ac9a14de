//! Run a simulated two-minute session and print the final stress report

use chrono::{Duration, Utc};
use synheart_stress::clock::{Clock, ManualClock};
use synheart_stress::sources::IntervalSource;
use synheart_stress::{EngineConfig, SimulatedSource, StressEncoder, StressProcessor};

fn main() {
    let start = Utc::now();
    let clock = ManualClock::new(start);

    let config = EngineConfig::default();
    let mut processor = match StressProcessor::with_config(config, Box::new(clock.clone())) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let mut source = match SimulatedSource::new(820.0) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };
    if let Err(e) = source.start(start) {
        eprintln!("Error: {e}");
        return;
    }

    clock.advance(Duration::seconds(120));
    match source.poll(clock.now()) {
        Ok(intervals) => {
            for interval in intervals {
                processor.ingest(interval);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    }

    let reading = processor.reading();
    match StressEncoder::new().encode_to_json_pretty(&reading) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
