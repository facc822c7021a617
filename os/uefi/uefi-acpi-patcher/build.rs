use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Drivers stay resident after their entry point returns; applications are unloaded.
    let driver = env::var_os("CARGO_FEATURE_DRIVER").is_some();
    let uefi = env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "uefi");
    if driver && uefi {
        println!("cargo:rustc-link-arg-bins=/SUBSYSTEM:EFI_BOOT_SERVICE_DRIVER");
    }
}
