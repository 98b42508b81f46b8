use std::hint::black_box;
use std::time::{Duration, Instant};

use nested_qs::{ArrayFormat, StringifyConfig, Value};

fn object<const N: usize>(entries: [(&str, Value); N]) -> Value {
    entries.into_iter().collect()
}

fn complex_value() -> Value {
    object([
        ("id", 42.into()),
        ("name", "Acme".into()),
        (
            "address",
            object([
                ("city", "Carrot City".into()),
                ("street", "Special-Street* No. 11".into()),
                ("postcode", "12345".into()),
            ]),
        ),
        ("user_ids", vec![1, 2, 3, 4].into()),
    ])
}

fn main() {
    let profile_duration = Duration::from_secs(30);
    println!("Profiling stringify for {:?}...", profile_duration);

    let format = match std::env::args().nth(1).as_deref() {
        Some(name) => match name.parse::<ArrayFormat>() {
            Ok(format) => format,
            Err(err) => {
                eprintln!("{err}");
                println!("Usage: cargo run --profile profiling --example profile_stringify [indices|brackets|repeat|comma]");
                return;
            }
        },
        None => ArrayFormat::Indices,
    };

    let config = StringifyConfig::new().array_format(format);
    let data = complex_value();

    let start = Instant::now();
    let mut count = 0u64;

    while start.elapsed() < profile_duration {
        for _ in 0..1000 {
            let _ = config.stringify(black_box(&data)).unwrap();
            count += 1;
        }
    }

    let elapsed = start.elapsed();
    println!("Completed {} stringifies ({:?}) in {:?}", count, format, elapsed);
    println!("Average: {:?} per operation", elapsed / count as u32);
}
