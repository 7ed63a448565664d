fn main() {
    // ESP-IDF link arguments only matter for on-target builds. Host builds
    // (library tests) must not touch the espressif toolchain.
    if std::env::var("CARGO_FEATURE_HARDWARE").is_ok() {
        embuild::espidf::sysenv::output();
    }
}
