//! Application constants for the interchange layer
//!
//! File names, suffix patterns, environment variables, and the running
//! dataset version shared by parsers, the pipeline, and the docs generator.

use crate::versioning::Version;

// =============================================================================
// Versioning
// =============================================================================

/// Version stamped into every artifact schema and the directory manifest
pub const INTERCHANGE_VERSION: Version = Version::new(1, 2);

/// Manifest file written at the artifact directory root
pub const VERSION_MANIFEST_FILENAME: &str = "_version.json";

/// Reserved schema-level metadata keys
pub const META_DATASET_VERSION: &str = "dataset_version";
pub const META_DATASET_VERSION_MAJOR: &str = "dataset_version_major";
pub const META_DATASET_VERSION_MINOR: &str = "dataset_version_minor";

/// Field-level metadata keys
pub const META_UNITS: &str = "units";
pub const META_DESCRIPTION: &str = "description";

// =============================================================================
// Environment
// =============================================================================

/// Setting this to `1` selects the single-threaded in-process parse path
pub const FORCE_SERIAL_ENV: &str = "WEPP_INTERCHANGE_FORCE_SERIAL";

/// Overrides the worker count chosen from the CPU count
pub const WORKERS_ENV: &str = "WEPP_INTERCHANGE_WORKERS";

// =============================================================================
// Directory layout
// =============================================================================

pub const OUTPUT_DIR_NAME: &str = "output";
pub const INTERCHANGE_DIR_NAME: &str = "interchange";
pub const README_FILENAME: &str = "README.md";

/// Suffix appended to an artifact name while it is being written
pub const TEMP_SUFFIX: &str = ".tmp";

// =============================================================================
// Raw input names
// =============================================================================

/// Hillslope file kinds, in the order the orchestrator runs them
pub const HILLSLOPE_KINDS: &[&str] = &["element", "wat", "pass", "loss", "soil", "ebe"];

pub const CHAN_OUT_FILENAME: &str = "chan.out";
pub const CHANWB_FILENAME: &str = "chanwb.out";
pub const CHNWB_FILENAME: &str = "chnwb.txt";
pub const EBE_PW0_FILENAME: &str = "ebe_pw0.txt";
pub const SOIL_PW0_FILENAME: &str = "soil_pw0.txt";
pub const LOSS_PW0_FILENAME: &str = "loss_pw0.txt";
pub const PASS_PW0_FILENAME: &str = "pass_pw0.txt";

// =============================================================================
// Artifact names
// =============================================================================

pub const H_ELEMENT_PARQUET: &str = "H.element.parquet";
pub const H_WAT_PARQUET: &str = "H.wat.parquet";
pub const H_PASS_PARQUET: &str = "H.pass.parquet";
pub const H_LOSS_PARQUET: &str = "H.loss.parquet";
pub const H_SOIL_PARQUET: &str = "H.soil.parquet";
pub const H_EBE_PARQUET: &str = "H.ebe.parquet";

pub const CHAN_OUT_PARQUET: &str = "chan.out.parquet";
pub const CHANWB_PARQUET: &str = "chanwb.parquet";
pub const CHNWB_PARQUET: &str = "chnwb.parquet";
pub const EBE_PW0_PARQUET: &str = "ebe_pw0.parquet";
pub const SOIL_PW0_PARQUET: &str = "soil_pw0.parquet";

pub const LOSS_PW0_HILL_PARQUET: &str = "loss_pw0.hill.parquet";
pub const LOSS_PW0_CHN_PARQUET: &str = "loss_pw0.chn.parquet";
pub const LOSS_PW0_OUT_PARQUET: &str = "loss_pw0.out.parquet";
pub const LOSS_PW0_CLASS_PARQUET: &str = "loss_pw0.class_data.parquet";
pub const LOSS_PW0_ALL_YEARS_HILL_PARQUET: &str = "loss_pw0.all_years.hill.parquet";
pub const LOSS_PW0_ALL_YEARS_CHN_PARQUET: &str = "loss_pw0.all_years.chn.parquet";
pub const LOSS_PW0_ALL_YEARS_OUT_PARQUET: &str = "loss_pw0.all_years.out.parquet";
pub const LOSS_PW0_ALL_YEARS_CLASS_PARQUET: &str = "loss_pw0.all_years.class_data.parquet";

pub const PASS_PW0_EVENTS_PARQUET: &str = "pass_pw0.events.parquet";
pub const PASS_PW0_METADATA_PARQUET: &str = "pass_pw0.metadata.parquet";

/// Products the documentation generator knows about, in README order
pub const DOCUMENTED_PRODUCTS: &[(&str, &str)] = &[
    (H_ELEMENT_PARQUET, "Daily hillslope element hydrology and sediment per OFE."),
    (H_WAT_PARQUET, "Daily hillslope water balance per OFE."),
    (H_PASS_PARQUET, "Hillslope PASS event, subevent, and no-event records."),
    (H_LOSS_PARQUET, "Particle class composition of sediment leaving each hillslope."),
    (H_SOIL_PARQUET, "Daily soil state per OFE."),
    (H_EBE_PARQUET, "Hillslope event-by-event runoff and sediment summary."),
    (CHAN_OUT_PARQUET, "Channel peak discharge per event."),
    (CHANWB_PARQUET, "Daily channel water balance."),
    (CHNWB_PARQUET, "Daily channel OFE water balance."),
    (EBE_PW0_PARQUET, "Watershed outlet event-by-event summary."),
    (SOIL_PW0_PARQUET, "Daily watershed soil state per channel OFE."),
    (LOSS_PW0_HILL_PARQUET, "Average annual hillslope summary from the watershed loss report."),
    (LOSS_PW0_CHN_PARQUET, "Average annual channel summary from the watershed loss report."),
    (LOSS_PW0_OUT_PARQUET, "Average annual outlet summary in key/value form."),
    (LOSS_PW0_CLASS_PARQUET, "Particle class composition of sediment leaving the outlet."),
    (
        LOSS_PW0_ALL_YEARS_HILL_PARQUET,
        "Per-year hillslope summaries from the watershed loss report.",
    ),
    (LOSS_PW0_ALL_YEARS_CHN_PARQUET, "Per-year channel summaries from the watershed loss report."),
    (LOSS_PW0_ALL_YEARS_OUT_PARQUET, "Per-year outlet summaries in key/value form."),
    (LOSS_PW0_ALL_YEARS_CLASS_PARQUET, "Per-year outlet particle class composition."),
    (PASS_PW0_EVENTS_PARQUET, "Watershed PASS records for every hillslope and day."),
    (
        PASS_PW0_METADATA_PARQUET,
        "Watershed PASS preamble: areas, particle diameters, coefficients.",
    ),
];

/// Default sentinel tokens that coerce to null
pub const DEFAULT_SENTINELS: &[&str] = &["******", "*****", "****", "***", "NaN", "nan", "-"];

/// Number of sediment particle classes WEPP reports
pub const PARTICLE_CLASSES: usize = 5;
