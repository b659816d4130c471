use std::env;

fn main() {
    let target = env::var("TARGET").unwrap_or_default();

    // Host builds only carry the library and its tests
    if !target.contains("avr") {
        return;
    }

    // Configure for ATmega128
    println!("cargo:rustc-link-arg=-mmcu=atmega128");

    if env::var("PROFILE").map(|p| p == "debug").unwrap_or(false) {
        println!("cargo:warning=Building sensor_bridge firmware (debug) for ATmega128 at 16MHz");
    }
}
