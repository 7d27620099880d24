use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use kurbo::Point;
use clap::{
    Arg, ArgAction, ArgMatches, Command, crate_version, crate_authors,
    value_parser,
};
use flatmap::{
    DirStore, Extractor, ImagePage, Layer, MapConfig, Presentation,
    PyramidBuilder, TileGeoreferencer,
};
use flatmap::feature::geojson;


/// An error has happened and has been reported.
#[derive(Clone, Copy, Debug)]
struct Failed;


struct Config {
    config: PathBuf,
    output: PathBuf,
    max_zoom: Option<u8>,
    layers: Option<Vec<String>>,
    tiles: bool,
    features: bool,
}

impl Config {
    pub fn get() -> Result<Self, Failed> {
        Self::from_matches(Self::get_matches())
    }

    fn get_matches() -> ArgMatches {
        Command::new("flatmap")
            .version(crate_version!())
            .author(crate_authors!())
            .about("makes a flat map from a drawing")
            .arg(Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("the map configuration file")
                .required(true)
                .action(ArgAction::Set)
            )
            .arg(Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("the directory to write the map to")
                .required(true)
                .action(ArgAction::Set)
            )
            .arg(Arg::new("max-zoom")
                .short('z')
                .long("max-zoom")
                .value_name("ZOOM")
                .value_parser(value_parser!(u8))
                .help("the zoom level to cut tiles at")
                .action(ArgAction::Set)
            )
            .arg(Arg::new("layer")
                .short('l')
                .long("layer")
                .value_name("ID")
                .help("only process the given layer")
                .num_args(1..)
                .action(ArgAction::Append)
            )
            .arg(Arg::new("no-tiles")
                .long("no-tiles")
                .help("don't build tile pyramids")
                .action(ArgAction::SetTrue)
            )
            .arg(Arg::new("no-features")
                .long("no-features")
                .help("don't write layer features")
                .action(ArgAction::SetTrue)
            )
            .get_matches()
    }

    fn from_matches(mut matches: ArgMatches) -> Result<Self, Failed> {
        let (config, output) = match (
            matches.remove_one::<PathBuf>("config"),
            matches.remove_one::<PathBuf>("output"),
        ) {
            (Some(config), Some(output)) => (config, output),
            _ => {
                eprintln!("Both a config file and output directory needed.");
                return Err(Failed)
            }
        };
        Ok(Config {
            config,
            output,
            max_zoom: matches.remove_one("max-zoom"),
            layers: matches.remove_many("layer").map(|layers| {
                let mut layers: Vec<String> = layers.collect();
                layers.sort();
                layers.dedup();
                layers
            }),
            tiles: !matches.get_flag("no-tiles"),
            features: !matches.get_flag("no-features"),
        })
    }

    pub fn run(self) -> Result<(), Failed> {
        let start = Instant::now();
        let mut map = MapConfig::load(&self.config).map_err(|err| {
            eprintln!("{}", err);
            Failed
        })?;
        if let Some(zoom) = self.max_zoom {
            map.max_zoom = zoom
        }
        let drawing = Presentation::load(&map.drawing).map_err(|err| {
            eprintln!("{}", err);
            Failed
        })?;
        let georef = TileGeoreferencer::new(
            map.extent, map.max_zoom
        ).map_err(|err| {
            eprintln!("{}", err);
            Failed
        })?;
        fs::create_dir_all(&self.output).map_err(|err| {
            eprintln!(
                "Failed to create output directory {}: {}",
                self.output.display(), err
            );
            Failed
        })?;

        let mut extractor = Extractor::new(&drawing);
        let layers = extractor.layers().map_err(|err| {
            eprintln!("{}", err);
            Failed
        })?;
        if layers.is_empty() {
            eprintln!("No map layers in drawing {}.", map.drawing.display());
            return Err(Failed)
        }
        if let Some(ref selected) = self.layers {
            for id in selected {
                if !layers.iter().any(|layer| layer.id == *id) {
                    eprintln!("Unknown layer '{}'.", id);
                    return Err(Failed)
                }
            }
        }
        let project = georef.flat_to_lonlat(
            extractor.bounds()
        ).map_err(|err| {
            eprintln!("{}", err);
            Failed
        })?;

        for layer in &layers {
            if !self.is_selected(&layer.id) {
                continue
            }
            if self.features {
                self.write_features(layer, &project)?;
            }
            if self.tiles {
                self.build_tiles(&map, &georef, layer)?;
            }
        }

        tracing::info!(
            "map {} done after {:.03}s",
            map.id, start.elapsed().as_secs_f32()
        );
        Ok(())
    }

    fn is_selected(&self, id: &str) -> bool {
        match self.layers {
            Some(ref layers) => layers.iter().any(|layer| layer == id),
            None => true,
        }
    }

    fn write_features(
        &self, layer: &Layer, project: impl Fn(Point) -> Point,
    ) -> Result<(), Failed> {
        let path = self.output.join(format!("{}.json", layer.id));
        let mut value = geojson::feature_collection(&layer.features, project);
        value["id"] = layer.id.clone().into();
        value["description"] = layer.description.clone().into();
        let data = serde_json::to_vec_pretty(&value).map_err(|err| {
            eprintln!("Failed to serialize layer {}: {}", layer.id, err);
            Failed
        })?;
        write_file(&path, &data)?;
        tracing::info!(
            "layer {}: wrote {} features to {}",
            layer.id, layer.features.len(), path.display()
        );
        Ok(())
    }

    fn build_tiles(
        &self, map: &MapConfig, georef: &TileGeoreferencer, layer: &Layer,
    ) -> Result<(), Failed> {
        let page_path = match map.page(&layer.id) {
            Some(path) => path,
            None => {
                tracing::info!("layer {}: no page, skipping tiles", layer.id);
                return Ok(())
            }
        };
        let page = ImagePage::open(page_path).map_err(|err| {
            eprintln!("Failed to open page {}: {}", page_path.display(), err);
            Failed
        })?;
        let mut store = DirStore::create_new(
            self.output.join(&layer.id)
        ).map_err(|err| {
            eprintln!("{}", err);
            Failed
        })?;
        let report = PyramidBuilder::new(
            georef, layer.id.clone()
        ).with_background(map.background).build(&page, &mut store).map_err(
            |err| {
                eprintln!("Failed to build tiles for {}: {}", layer.id, err);
                Failed
            }
        )?;
        tracing::info!("{}", report);
        Ok(())
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), Failed> {
    fs::write(path, data).map_err(|err| {
        eprintln!("Failed to write {}: {}", path.display(), err);
        Failed
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let res = Config::get().and_then(Config::run);
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failed) => ExitCode::FAILURE,
    }
}
