//! Put the stub linker script on the search path
//!
//! The ROM symbol scripts (`esp32.rom.ld`, `esp32.rom.spiflash.ld`) come
//! from the vendor SDK; point `ESP_ROM_LD_DIR` at the directory holding
//! them.

use std::env;
use std::path::PathBuf;

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    println!(
        "cargo:rustc-link-search={}",
        manifest_dir.join("ld").display()
    );
    println!("cargo:rerun-if-changed=ld/stub.x");

    println!("cargo:rerun-if-env-changed=ESP_ROM_LD_DIR");
    if let Ok(dir) = env::var("ESP_ROM_LD_DIR") {
        println!("cargo:rustc-link-search={}", dir);
    }
}
