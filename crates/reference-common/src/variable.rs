//! Variable catalog: which GRIB message holds a reforecast variable.
//!
//! The archive stores one variable per file, named after the variable
//! (e.g. `pres_msl_2000010100_c00.grib2`). Each entry maps that name to the
//! array name used in the manifest and the inventory tags that select its
//! message.

/// Description of a reforecast variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSpec {
    /// File-name prefix in the archive (e.g. "pres_msl")
    pub name: &'static str,
    /// Array name in the reference manifest (e.g. "msl")
    pub array: &'static str,
    /// Inventory variable tag (e.g. "PRMSL")
    pub grib_tag: &'static str,
    /// Inventory level tag
    pub level: &'static str,
    /// Physical units
    pub units: &'static str,
}

/// Variables with a known message layout.
pub fn known_variables() -> Vec<VariableSpec> {
    vec![
        VariableSpec {
            name: "pres_msl",
            array: "msl",
            grib_tag: "PRMSL",
            level: "mean sea level",
            units: "Pa",
        },
        VariableSpec {
            name: "tmp_2m",
            array: "t2m",
            grib_tag: "TMP",
            level: "2 m above ground",
            units: "K",
        },
    ]
}

/// Look up a variable by its archive name.
pub fn lookup_variable(name: &str) -> Option<VariableSpec> {
    known_variables().into_iter().find(|v| v.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_pres_msl() {
        let spec = lookup_variable("pres_msl").unwrap();
        assert_eq!(spec.array, "msl");
        assert_eq!(spec.grib_tag, "PRMSL");
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup_variable("soilw_bgrnd").is_none());
    }
}
