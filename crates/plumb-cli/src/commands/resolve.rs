use super::{json_pretty, registry, EXIT_SUCCESS};
use plumb_driver::lookup_provisioner;
use plumb_schema::ProvisionerType;
use serde::Serialize;

#[derive(Serialize)]
struct Resolution<'a> {
    requested: &'a str,
    driver: &'a str,
    provisioner_type: Option<&'a str>,
    storage_provisioner: Option<&'static str>,
}

pub fn run(requested: &str, default_provisioner: Option<&str>, json: bool) -> Result<u8, String> {
    let mut registry = registry()?;
    registry.set_default_provisioner(default_provisioner.map(ProvisionerType::new));

    let adapter = registry
        .resolve(requested)
        .map_err(|e| format!("driver error: {e}"))?;
    let table = adapter.provisioners();
    let provisioner_type = [Some(requested), default_provisioner]
        .into_iter()
        .flatten()
        .find(|ty| lookup_provisioner(table, ty).is_some());
    let resolution = Resolution {
        requested,
        driver: adapter.name(),
        provisioner_type,
        storage_provisioner: provisioner_type.and_then(|ty| lookup_provisioner(table, ty)),
    };

    if json {
        println!("{}", json_pretty(&resolution)?);
    } else {
        match resolution.storage_provisioner {
            Some(provisioner) => println!("{requested} -> {} ({provisioner})", resolution.driver),
            None => println!("{requested} -> {}", resolution.driver),
        }
    }
    Ok(EXIT_SUCCESS)
}
