use log::warn;

const DEFAULT_NAME: &str = "localhost";

// The name of this host, used when the server has not been given a name
pub(crate) fn system_hostname() -> String {
    match hostname::get() {
        Err(e) => {
            warn!("Unable to get hostname, using {}: {}", DEFAULT_NAME, e);
            DEFAULT_NAME.to_owned()
        }
        Ok(name) => match name.into_string() {
            Ok(name) if !name.trim().is_empty() => name.trim().to_owned(),
            Ok(_) => DEFAULT_NAME.to_owned(),
            Err(name) => {
                warn!("Unable to use hostname {:?}, using {}", name, DEFAULT_NAME);
                DEFAULT_NAME.to_owned()
            }
        },
    }
}
