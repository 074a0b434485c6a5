use std::fs;

const CONFIG_PATH: &str = "src/default_config.toml";

fn main() {
    println!("cargo:rerun-if-changed={CONFIG_PATH}");

    let content = fs::read_to_string(CONFIG_PATH).expect("Failed to read default_config.toml");
    let table = match content.parse::<toml::Table>() {
        Ok(table) => table,
        Err(e) => panic!("Invalid default_config.toml: {e}"),
    };

    // The binary has no other source for its file names
    let paths = table.get("paths").and_then(|p| p.as_table());
    for key in ["input", "output"] {
        if !paths.is_some_and(|p| p.get(key).is_some_and(toml::Value::is_str)) {
            panic!("default_config.toml: [paths] {key} must be a string");
        }
    }
}
