use dicom_batch_curate::config::ConfigBuilder;

// Dump the default configuration as JSON, as a starting point for --config.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigBuilder::default().build();
    let json = serde_json::to_string_pretty(&config)?;
    println!("{json}");
    Ok(())
}
