use std::env;

/// Build-time defaults injected as `rustc-env` variables.
///
/// Each entry is (variable name, fallback value, hide value in warnings).
const DEFAULTS: &[(&str, &str, bool)] = &[
    ("TRACKER_DEVICE_ID", "BIKE_TRACKER_001", false),
    ("TRACKER_API_URL", "", false),
    ("TRACKER_APN", "internet", false),
    ("TRACKER_APN_USER", "", false),
    ("TRACKER_APN_PASSWORD", "", true),
    ("TRACKER_CONTACT", "+1234567890", true),
];

fn main() {
    // Read tracker provisioning from environment variables (optional)
    // These are used as default values when parameter storage is empty
    for (name, fallback, secret) in DEFAULTS {
        match env::var(name) {
            Ok(value) => {
                println!("cargo:rustc-env={}={}", name, value);
                if *secret {
                    println!("cargo:warning=Using {} from environment (hidden)", name);
                } else {
                    println!("cargo:warning=Using {} from environment: {}", name, value);
                }
            }
            Err(_) => println!("cargo:rustc-env={}={}", name, fallback),
        }

        // Rerun if environment variables change
        println!("cargo:rerun-if-env-changed={}", name);
    }
}
