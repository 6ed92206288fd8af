use {
    daylog::{PathTemplate, RotatingFileWriterBuilder, TimeZone},
    std::io::Write,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // One directory per month: ./logs/2025-04/2025-04-01.log
    let mut logger = RotatingFileWriterBuilder::new(PathTemplate::new("./logs/%Y-%m/%Y-%m-%d.log")?)
        .time_zone(TimeZone::UTC) // Use UTC for consistent timing across different regions
        .file_mode(0o640) // Owner rw, group r, others none
        .build()?;

    // These lines go to the file for the current UTC day
    writeln!(logger, "System startup - UTC date decides the file name")?;
    writeln!(logger, "Configuration loaded successfully")?;
    writeln!(logger, "Server listening on port 8080")?;

    println!("Wrote to {}", logger.current_path().unwrap_or_default().display());
    logger.close()?;
    Ok(())
}
