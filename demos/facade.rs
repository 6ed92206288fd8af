use {
    daylog::{Logger, Stream},
    std::{sync::Arc, thread},
    url::Url,
};

fn handle_request(logger: &Logger, url: &Url) {
    let _scope = logger.start_verbose_for_url(url);
    daylog::verbose!(logger, "query: {:?}", url.query());
    daylog::info!(logger, "served {}", url.path());
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = Arc::new(Logger::new());
    logger.set_echo_stdout(true);
    logger.open("./logs", ".txt", Stream::Info)?;
    logger.open("./logs", "-error.txt", Stream::Error)?;

    let workers: Vec<_> = ["/items", "/items?vl=1", "/users/7"]
        .into_iter()
        .map(|path| {
            let logger = logger.clone();
            thread::spawn(move || {
                let url = Url::parse("http://localhost")?.join(path)?;
                handle_request(&logger, &url);
                Ok::<_, url::ParseError>(())
            })
        })
        .collect();
    for worker in workers {
        if let Err(err) = worker.join().map_err(|_| "worker panicked")? {
            daylog::report!(logger, err);
        }
    }

    daylog::error!(logger, "Error {}: upstream timed out", 504);
    logger.close()?;
    Ok(())
}
