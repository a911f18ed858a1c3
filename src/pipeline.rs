//! The map pipeline: resolve, fetch, compose, crop, write.
//!
//! Each stage only sees the previous stage's output. A failed fetch stops the
//! run before anything is drawn, so no image is written.

use std::path::PathBuf;

use tracing::{error, info};

use crate::compose::{compose, ComposeOptions, LayerInstruction, Palette};
use crate::error::PipelineError;
use crate::fetch::{FetchedData, GeoDataSource};
use crate::models::RegionQuery;
use crate::raster::{render, RenderOptions};
use crate::region::RegionResolver;
use crate::viewport::Viewport;

/// Everything computed before the image is written
#[derive(Debug, Clone, PartialEq)]
pub struct MapPlan {
    pub query: RegionQuery,
    pub data: FetchedData,
    pub instructions: Vec<LayerInstruction>,
    pub viewport: Viewport,
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub plan: MapPlan,
    pub output: PathBuf,
}

pub struct Pipeline<S> {
    resolver: RegionResolver,
    source: S,
    palette: Palette,
    compose_options: ComposeOptions,
    render_options: RenderOptions,
}

impl<S: GeoDataSource> Pipeline<S> {
    pub fn new(source: S) -> Self {
        Self {
            resolver: RegionResolver::default(),
            source,
            palette: Palette::default(),
            compose_options: ComposeOptions::default(),
            render_options: RenderOptions::default(),
        }
    }

    pub fn with_compose_options(mut self, options: ComposeOptions) -> Self {
        self.compose_options = options;
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    /// Run every stage except writing the image.
    pub async fn plan(&self, location: &str) -> Result<MapPlan, PipelineError> {
        let query = self.resolver.resolve(location)?;
        info!("Fetching data for {} ({})...", location, query);

        let data = match self.source.fetch(&query).await {
            Ok(data) => data,
            Err(e) => {
                error!("Error fetching data: {}", e);
                return Err(PipelineError::Fetch(e));
            }
        };

        let instructions = compose(
            &data.land,
            &data.points,
            &self.palette,
            &self.compose_options,
        );
        let viewport = Viewport::from_land(&data.land)?;
        info!(
            "Composed {} layers, viewport {}",
            instructions.len(),
            viewport
        );

        Ok(MapPlan {
            query,
            data,
            instructions,
            viewport,
        })
    }

    /// Run the whole pipeline and write the image.
    pub async fn run(&self, location: &str) -> Result<RunOutcome, PipelineError> {
        let plan = self.plan(location).await?;

        let output = render(
            &plan.instructions,
            &plan.data.land,
            &plan.data.points,
            &plan.viewport,
            &self.render_options,
        )?;

        Ok(RunOutcome { plan, output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Role;
    use crate::error::FetchError;
    use crate::models::{Feature, FeatureCollection, OsmType};
    use geo::{point, polygon};
    use std::sync::Mutex;

    /// Returns canned data (or a canned failure) and records the queries it saw
    struct FixtureSource {
        data: Option<FetchedData>,
        queries: Mutex<Vec<RegionQuery>>,
    }

    impl FixtureSource {
        fn returning(data: FetchedData) -> Self {
            Self {
                data: Some(data),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                data: None,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<RegionQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl GeoDataSource for FixtureSource {
        async fn fetch(&self, query: &RegionQuery) -> Result<FetchedData, FetchError> {
            self.queries.lock().unwrap().push(query.clone());
            self.data
                .clone()
                .ok_or_else(|| FetchError::Network("connection refused".to_string()))
        }
    }

    fn boothbay_land() -> FeatureCollection {
        FeatureCollection::new(vec![Feature::new(
            polygon![
                (x: -69.70, y: 43.79),
                (x: -69.56, y: 43.79),
                (x: -69.56, y: 43.91),
                (x: -69.70, y: 43.91),
            ]
            .into(),
            OsmType::Relation,
            407186,
            0,
        )
        .with_name("Boothbay")])
    }

    fn boothbay_lights() -> FeatureCollection {
        FeatureCollection::new(vec![
            Feature::new(point!(x: -69.63, y: 43.85).into(), OsmType::Node, 1, 0)
                .with_name("Burnt Island Light"),
            Feature::new(point!(x: -69.58, y: 43.82).into(), OsmType::Node, 2, 1)
                .with_name("Ram Island Light"),
        ])
    }

    fn small_render(dir: &tempfile::TempDir) -> RenderOptions {
        RenderOptions {
            output: dir.path().join("coastline_output.png"),
            dpi: 10,
            ..RenderOptions::default()
        }
    }

    #[tokio::test]
    async fn test_scenario_place_with_named_lights() {
        let source = FixtureSource::returning(FetchedData {
            land: boothbay_land(),
            points: boothbay_lights(),
        });
        let pipeline = Pipeline::new(source);

        let plan = pipeline.plan("Boothbay, Maine, USA").await.unwrap();
        assert_eq!(
            plan.query,
            RegionQuery::Place("Boothbay, Maine, USA".to_string())
        );
        assert_eq!(plan.instructions.len(), 9);
        assert_eq!(
            plan.instructions
                .iter()
                .filter(|l| l.role == Role::Label)
                .count(),
            2
        );
        assert_eq!(
            plan.viewport,
            Viewport {
                min_x: -69.70,
                min_y: 43.79,
                max_x: -69.56,
                max_y: 43.91,
            }
        );
    }

    #[tokio::test]
    async fn test_scenario_whole_state_uses_bbox() {
        let source = FixtureSource::returning(FetchedData {
            land: boothbay_land(),
            points: FeatureCollection::empty(),
        });
        let pipeline = Pipeline::new(source);

        pipeline.plan("Maine, USA").await.unwrap();

        let queries = pipeline.source.queries();
        assert_eq!(queries.len(), 1);
        match &queries[0] {
            RegionQuery::BoundingBox(bbox) => {
                assert_eq!(bbox.north, 47.46);
                assert_eq!(bbox.south, 42.97);
            }
            other => panic!("expected bbox query, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scenario_fetch_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let options = small_render(&dir);
        let output = options.output.clone();
        let pipeline = Pipeline::new(FixtureSource::failing()).with_render_options(options);

        let err = pipeline.run("Boothbay, Maine, USA").await.unwrap_err();
        assert!(err.is_fetch());
        assert!(err.to_string().contains("connection refused"));
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_scenario_no_lights_still_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixtureSource::returning(FetchedData {
            land: boothbay_land(),
            points: FeatureCollection::empty(),
        });
        let pipeline = Pipeline::new(source).with_render_options(small_render(&dir));

        let outcome = pipeline.run("Boothbay, Maine, USA").await.unwrap();
        assert_eq!(outcome.plan.instructions.len(), 4);
        assert!(outcome.output.exists());

        let image = image::open(&outcome.output).unwrap();
        assert!(image.width() > 0 && image.height() > 0);
    }

    #[tokio::test]
    async fn test_empty_land_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let options = small_render(&dir);
        let output = options.output.clone();
        let source = FixtureSource::returning(FetchedData {
            land: FeatureCollection::empty(),
            points: boothbay_lights(),
        });
        let pipeline = Pipeline::new(source).with_render_options(options);

        let err = pipeline.run("Boothbay, Maine, USA").await.unwrap_err();
        assert!(matches!(err, PipelineError::Viewport(_)));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_plan_is_idempotent() {
        let data = FetchedData {
            land: boothbay_land(),
            points: boothbay_lights(),
        };
        let pipeline = Pipeline::new(FixtureSource::returning(data.clone()));

        let first = pipeline.plan("Boothbay, Maine, USA").await.unwrap();
        let second = pipeline.plan("Boothbay, Maine, USA").await.unwrap();
        assert_eq!(first.instructions, second.instructions);
        assert_eq!(first.viewport, second.viewport);
        assert_eq!(first.data, data);
    }

    #[tokio::test]
    async fn test_viewport_ignores_points_outside_land() {
        let far_light = FeatureCollection::new(vec![Feature::new(
            point!(x: -60.0, y: 50.0).into(),
            OsmType::Node,
            9,
            0,
        )]);
        let pipeline = Pipeline::new(FixtureSource::returning(FetchedData {
            land: boothbay_land(),
            points: far_light,
        }));

        let plan = pipeline.plan("Boothbay, Maine, USA").await.unwrap();
        assert_eq!(plan.viewport.max_x, -69.56);
        assert_eq!(plan.viewport.max_y, 43.91);
    }
}
