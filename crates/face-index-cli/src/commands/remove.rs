//! Remove command implementation.

use anyhow::Result;
use face_index_core::ProfileId;

use crate::config::Config;

use super::open_index;

pub fn execute(config: &Config, id: i64) -> Result<()> {
    let id = ProfileId(id);
    let mut index = open_index(config)?;

    if index.remove(id)? {
        println!("Removed face profile {id}");
    } else {
        println!("Face profile {id} is not enrolled");
    }
    Ok(())
}
