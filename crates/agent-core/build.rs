use std::env;

fn main() {
	println!(
		"cargo:rustc-env=AGENT_BUILD_RUSTC_VERSION={}",
		rustc_version::version().unwrap()
	);
	println!(
		"cargo:rustc-env=AGENT_BUILD_PROFILE_NAME={}",
		env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string())
	);
	println!("cargo:rerun-if-env-changed=PROFILE");
}
