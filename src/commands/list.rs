//! `lockdown list`

use anyhow::Result;

use crate::exit_codes;
use crate::output::{schema, Envelope, ListResponse, Output};
use crate::registry::Registry;
use crate::report::format_list;

pub fn list(registry: &Registry, output: &Output) -> Result<i32> {
    if output.is_json() {
        let response = ListResponse::from_registry(registry);
        output.json(&Envelope::new(schema::LIST, true, response))?;
    } else {
        print!("{}", format_list(registry));
    }
    Ok(exit_codes::PASSED)
}
