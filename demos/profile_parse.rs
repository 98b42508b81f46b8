use std::hint::black_box;
use std::time::{Duration, Instant};

use nested_qs::ParseConfig;

const SIMPLE_QUERY: &str = "id=42&name=test_user&active=true";
const MAP_QUERY: &str = "key1=value1&key2=value2&key3=value3&key4=value4&key5=value5";
const COMPLEX_QUERY: &str = "id=42&name=Acme&phone=12345&address[city]=Carrot+City&\
                             address[street]=Special-Street*+No.+11&address[postcode]=12345&\
                             user_ids[]=1&user_ids[]=2&user_ids[]=3&user_ids[]=4";

fn main() {
    let profile_duration = Duration::from_secs(30);
    println!("Profiling parse for {:?}...", profile_duration);

    match std::env::args().nth(1).as_deref() {
        Some("simple") => profile_timed("simple", SIMPLE_QUERY, profile_duration),
        Some("complex") => profile_timed("complex", COMPLEX_QUERY, profile_duration),
        Some("mixed") => profile_mixed_workload(profile_duration),
        _ => {
            println!("Usage: cargo run --profile profiling --example profile_parse [simple|complex|mixed]");
            println!("Defaulting to mixed workload...");
            profile_mixed_workload(profile_duration);
        }
    }
}

fn profile_timed(name: &str, query: &str, duration: Duration) {
    println!("Running {name} parse profile...");
    let config = ParseConfig::new();

    let start = Instant::now();
    let mut count = 0u64;

    while start.elapsed() < duration {
        // batches keep the clock out of the profile
        for _ in 0..1000 {
            let _ = config.parse(black_box(query)).unwrap();
            count += 1;
        }
    }

    let elapsed = start.elapsed();
    println!("Completed {} parses in {:?}", count, elapsed);
    println!("Average: {:?} per operation", elapsed / count as u32);
}

fn profile_mixed_workload(duration: Duration) {
    println!("Running mixed workload profile...");
    let config = ParseConfig::new();

    let start = Instant::now();
    let mut counts = [0u64; 3];

    while start.elapsed() < duration {
        for (count, query) in counts.iter_mut().zip([SIMPLE_QUERY, MAP_QUERY, COMPLEX_QUERY]) {
            for _ in 0..100 {
                let _ = config.parse(black_box(query)).unwrap();
                *count += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    let total: u64 = counts.iter().sum();

    println!("\nProfile complete:");
    println!("Total operations: {}", total);
    println!("- Simple: {}", counts[0]);
    println!("- Map: {}", counts[1]);
    println!("- Complex: {}", counts[2]);
    println!("Total time: {:?}", elapsed);
    println!("Average: {:?} per operation", elapsed / total as u32);
}
