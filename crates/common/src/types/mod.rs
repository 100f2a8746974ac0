use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    pub status: &'static str,
}

/// Routes available for the loaded document, served from `/`.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct ResourceIndex {
    pub collections: Vec<String>,
    pub singletons: Vec<String>,
    pub db: String,
}
