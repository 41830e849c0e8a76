fn main() {
    if let Err(e) = effects_bridge_lib::run() {
        eprintln!("effects-bridge: {e}");
        std::process::exit(1);
    }
}
