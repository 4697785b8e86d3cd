use plumb_schema::ProvisionerType;
use super::{json_pretty, registry, EXIT_SUCCESS};

pub fn run(json: bool) -> Result<u8, String> {
    let drivers = registry()?.drivers();
    if json {
        println!("{}", json_pretty(&drivers)?);
    } else {
        println!("{:<10} PROVISIONER TYPES", "DRIVER");
        for driver in &drivers {
            let aliases: Vec<&str> = driver.aliases.iter().map(ProvisionerType::as_str).collect();
            println!("{:<10} {}", driver.name, aliases.join(", "));
        }
    }
    Ok(EXIT_SUCCESS)
}
