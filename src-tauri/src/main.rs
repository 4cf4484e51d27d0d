// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    if std::env::args().nth(1).as_deref() == Some("initdb") {
        match habitline_lib::init_database() {
            Ok(path) => println!("Initialized database at {}.", path.display()),
            Err(error) => {
                eprintln!("Failed to initialize database: {error:#}");
                std::process::exit(1);
            }
        }
        return;
    }
    habitline_lib::run()
}
