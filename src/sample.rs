//! Random sample laptops for the client, tests and benchmarks.

use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::proto::keyboard::Layout;
use crate::proto::laptop::Weight;
use crate::proto::memory::Unit;
use crate::proto::screen::{Panel, Resolution};
use crate::proto::storage::Driver;
use crate::proto::{Cpu, Gpu, Keyboard, Laptop, Memory, Screen, Storage};

/// Generates a laptop with a fresh id and random specifications.
pub fn new_laptop() -> Laptop {
    let mut rng = rand::thread_rng();
    let brand = pick(&mut rng, &["Apple", "Dell", "Lenovo"]);

    Laptop {
        id: Uuid::new_v4().to_string(),
        brand: brand.to_string(),
        name: laptop_name(&mut rng, brand).to_string(),
        cpu: Some(new_cpu(&mut rng)),
        ram: Some(memory(rng.gen_range(4..=64), Unit::Gigabyte)),
        gpus: vec![new_gpu(&mut rng)],
        storages: vec![
            Storage {
                driver: Driver::Ssd as i32,
                memory: Some(memory(rng.gen_range(128..=1024), Unit::Gigabyte)),
            },
            Storage {
                driver: Driver::Hdd as i32,
                memory: Some(memory(rng.gen_range(1..=6), Unit::Terabyte)),
            },
        ],
        screen: Some(new_screen(&mut rng)),
        keyboard: Some(Keyboard {
            layout: *[Layout::Qwerty, Layout::Qwertz, Layout::Azerty]
                .choose(&mut rng)
                .unwrap_or(&Layout::Qwerty) as i32,
            backlit: rng.gen(),
        }),
        weight: Some(Weight::WeightKg(rng.gen_range(1.0..3.0))),
        price_usd: rng.gen_range(1500.0..3500.0),
        release_year: rng.gen_range(2015..=2024),
    }
}

/// A random rating score between 1 and 10.
pub fn random_score() -> f64 {
    f64::from(rand::thread_rng().gen_range(1u8..=10))
}

fn new_cpu(rng: &mut impl Rng) -> Cpu {
    let brand = pick(rng, &["Intel", "AMD"]);
    let name = match brand {
        "Intel" => pick(rng, &["Xeon E-2286M", "Core i9-9980HK", "Core i7-9750H"]),
        _ => pick(rng, &["Ryzen 7 PRO 2700U", "Ryzen 5 PRO 3500U"]),
    };
    let number_cores = rng.gen_range(2..=8);
    let min_ghz = rng.gen_range(2.0..3.5);

    Cpu {
        brand: brand.to_string(),
        name: name.to_string(),
        number_cores,
        number_threads: rng.gen_range(number_cores..=12),
        min_ghz,
        max_ghz: rng.gen_range(min_ghz..5.0),
    }
}

fn new_gpu(rng: &mut impl Rng) -> Gpu {
    let brand = pick(rng, &["Nvidia", "AMD"]);
    let name = match brand {
        "Nvidia" => pick(rng, &["RTX 2060", "RTX 2070", "GTX 1660-Ti"]),
        _ => pick(rng, &["RX 590", "RX 580", "RX Vega-56"]),
    };
    let min_ghz = rng.gen_range(1.0..1.5);

    Gpu {
        brand: brand.to_string(),
        name: name.to_string(),
        min_ghz,
        max_ghz: rng.gen_range(min_ghz..2.0),
        memory: Some(memory(rng.gen_range(2..=6), Unit::Gigabyte)),
    }
}

fn new_screen(rng: &mut impl Rng) -> Screen {
    let height = rng.gen_range(1080..=4320);

    Screen {
        size_inch: rng.gen_range(13.0..17.0),
        resolution: Some(Resolution {
            width: height * 16 / 9,
            height,
        }),
        panel: *[Panel::Ips, Panel::Oled]
            .choose(&mut *rng)
            .unwrap_or(&Panel::Ips) as i32,
        multitouch: rng.gen(),
    }
}

fn laptop_name(rng: &mut impl Rng, brand: &str) -> &'static str {
    match brand {
        "Apple" => pick(rng, &["Macbook Air", "Macbook Pro"]),
        "Dell" => pick(rng, &["Latitude", "Vostro", "XPS", "Alienware"]),
        _ => pick(rng, &["Thinkpad X1", "Thinkpad P1", "Thinkpad P53"]),
    }
}

fn memory(value: u64, unit: Unit) -> Memory {
    Memory {
        value,
        unit: unit as i32,
    }
}

fn pick(rng: &mut impl Rng, values: &[&'static str]) -> &'static str {
    values.choose(rng).copied().unwrap_or_default()
}
