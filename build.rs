//! This build script copies the `memory.x` file from the crate root into a directory where
//! the linker can always find it at build time, records the build time as the boot
//! time of the watch clock and bundles the accelerometer feature config.

use std::{env, fs::File, io::Write, path::PathBuf};

fn main() {
    // Put memory layout in the output directory and ensure it's on the linker search path.
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(include_bytes!("memory.x"))
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());

    // Create rs file with current UTC time
    File::create(out.join("utc.rs"))
        .unwrap()
        .write_fmt(format_args!(
            "const UTC_EPOCH: i64 = {:?};",
            chrono::Utc::now().timestamp()
        ))
        .unwrap();

    // Feature engine config of the BMA421, supplied by the vendor. Without it the
    // step counter only works when the bootloader already loaded the engine.
    let config = match env::var_os("BMA421_CONFIG") {
        Some(path) => {
            println!("cargo:rerun-if-changed={}", PathBuf::from(&path).display());
            std::fs::read(path).unwrap()
        }
        None => Vec::new(),
    };
    File::create(out.join("bma421_config.bin"))
        .unwrap()
        .write_all(&config)
        .unwrap();

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-env-changed=BMA421_CONFIG");
}
