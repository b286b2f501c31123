//! MapChannel - staged processing of planetary map data
//!
//! This library fetches raster map tiles for a geographic window, runs them
//! through chains of processing stages, folds the chains together with a
//! composite stage and reports each finished result to a receiver.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use mapchannel::app::{AppConfig, MapApp};
//! use mapchannel::settings::SessionConfig;
//! use mapchannel::view::OffscreenView;
//!
//! let app = MapApp::start_sync(AppConfig::default())?;
//! let session = SessionConfig::load(path)?;
//! let request = session.window.unwrap().to_request()?;
//!
//! let view = Arc::new(OffscreenView::new(request));
//! let channel = app.create_channel(view.clone());
//! channel.set_pipelines(session.build(&app.build_context())?)?;
//! let pass = channel.set_map_window(request);
//! app.block_on(pass.wait())?;
//! ```

pub mod app;
pub mod channel;
pub mod composite;
pub mod config;
pub mod geo;
pub mod logging;
pub mod pipeline;
pub mod raster;
pub mod settings;
pub mod source;
pub mod stage;
pub mod view;

pub use channel::{MapChannel, MapChannelReceiver, MapResult, MapUpdate};
pub use geo::{GeoRect, GeoRequest, Projection};
pub use pipeline::{Pipeline, PipelineError};
pub use raster::{ChangedArea, MapAttr, MapData};
