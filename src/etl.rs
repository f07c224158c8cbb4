pub mod audit;
pub mod normalize;
pub mod osm_to_csv;
pub mod read_osm;
pub mod shape;
pub mod validate;
pub mod write_csv;

use log::{error, info};

use crate::errors::Result;

pub type Source<T> = Box<dyn Iterator<Item = Result<T>>>;

/// A single-pass stage: `extract` opens a stream of inputs, each input goes through
/// `transform` and then `load` before the next one is pulled, and `finish` runs
/// once the stream is exhausted.
pub trait Etl {
    type Input: 'static;
    type Output;

    fn etl_name(&self) -> &str;

    /// Wrap the input stream in a progress display.
    fn show_progress(&self) -> bool {
        false
    }

    fn extract(&mut self) -> Result<Source<Self::Input>>;
    /// `Ok(None)` drops the input without loading anything for it.
    fn transform(&mut self, input: Self::Input) -> Result<Option<Self::Output>>;
    fn load(&mut self, output: Self::Output) -> Result<()>;
    fn finish(&mut self) -> Result<()>;

    fn process(&mut self) -> Result<()> {
        info!(etl_name = self.etl_name(); "Starting ETL process");

        info!(etl_name = self.etl_name(); "Extracting");
        let source = match self.extract() {
            Ok(source) => Ok(source),
            Err(err) => {
                error!(etl_name = self.etl_name(), err = err.message.as_str(); "Extraction failed with error");
                Err(err)
            },
        }?;
        let source: Source<Self::Input> = if self.show_progress() {
            Box::new(tqdm::tqdm(source))
        } else {
            source
        };

        info!(etl_name = self.etl_name(); "Transforming and loading");
        for item in source {
            let input = match item {
                Ok(input) => Ok(input),
                Err(err) => {
                    error!(etl_name = self.etl_name(), err = err.message.as_str(); "Reading input failed with error");
                    Err(err)
                },
            }?;

            let output = match self.transform(input) {
                Ok(output) => Ok(output),
                Err(err) => {
                    error!(etl_name = self.etl_name(), err = err.message.as_str(); "Transformation failed with error");
                    Err(err)
                },
            }?;

            if let Some(output) = output {
                match self.load(output) {
                    Ok(_) => Ok(()),
                    Err(err) => {
                        error!(etl_name = self.etl_name(), err = err.message.as_str(); "Loading failed with error");
                        Err(err)
                    },
                }?;
            }
        }

        match self.finish() {
            Ok(_) => Ok(()),
            Err(err) => {
                error!(etl_name = self.etl_name(), err = err.message.as_str(); "Finishing failed with error");
                Err(err)
            },
        }?;
        info!(etl_name = self.etl_name(); "Process finished");
        Ok(())
    }
}
