//! Device Listing Example
//!
//! Enumerates HID and serial devices, then optionally watches for hotplug
//! changes.
//!
//! # Usage
//!
//! ```bash
//! # List every device once
//! cargo run --example list_devices
//!
//! # Only serial ports, then keep watching
//! cargo run --example list_devices -- --serial --watch
//!
//! # Use a configuration file
//! cargo run --example list_devices -- --config portwatch.toml
//! ```

use portwatch::prelude::*;

fn main() {
    // Initialize tracing for log output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    let config = match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1).map(Config::load) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                eprintln!("Cannot load configuration: {e}");
                std::process::exit(1);
            }
            None => {
                eprintln!("--config needs a path");
                std::process::exit(2);
            }
        },
        None => Config::default(),
    };
    config.log.apply();

    let mut filter = DeviceFilter::any();
    if args.iter().any(|a| a == "--serial") {
        filter = DeviceFilter::of_type(DeviceType::Serial);
    } else if args.iter().any(|a| a == "--hid") {
        filter = DeviceFilter::of_type(DeviceType::Hid);
    }

    println!("=== portwatch on {} ===", detect_platform());
    let backend = default_backend(&config);

    if args.iter().any(|a| a == "--watch") {
        if let Err(e) = watch(backend, filter) {
            eprintln!("Watch failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    match enumerate(&backend, &filter) {
        Ok(devices) if devices.is_empty() => println!("No devices found"),
        Ok(devices) => devices.iter().for_each(print_device),
        Err(e) => {
            eprintln!("Enumeration failed: {e}");
            std::process::exit(1);
        }
    }
}

fn watch(backend: std::sync::Arc<dyn portwatch::core::Backend>, filter: DeviceFilter) -> Result<()> {
    const MONITOR: u32 = 0;

    let mut monitor = Monitor::new(backend, filter)?;
    monitor.devices().for_each(print_device);

    let mut set = DescriptorSet::new();
    set.add(MONITOR, monitor.descriptor())?;
    println!("Watching for changes, Ctrl-C to stop");
    loop {
        if !set.poll(-1)?.contains(&MONITOR) {
            continue;
        }
        for event in monitor.refresh()? {
            match event {
                MonitorEvent::Added(device) => {
                    print!("+ ");
                    print_device(&device);
                }
                MonitorEvent::Removed(device) => println!("- {device}"),
            }
        }
    }
}

fn print_device(device: &Device) {
    println!("{device}");
    if let Some(product) = device.product_string() {
        println!("    product:  {product}");
    }
    if let Some(serial) = device.serial_number_string() {
        println!("    serial:   {serial}");
    }
    println!("    interface {}", device.interface_number());
}

fn print_help() {
    println!("list_devices [--serial | --hid] [--watch] [--config PATH]");
}
