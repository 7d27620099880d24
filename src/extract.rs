//! Extracting map layers from the slides of a drawing.

use std::fmt;
use std::collections::HashSet;
use kurbo::Rect;
use crate::drawing::{Presentation, Shape, ShapeKind, Slide};
use crate::drawing::load::DocumentError;
use crate::drawing::units;
use crate::drawing::xfrm::TransformStack;
use crate::feature::{
    Feature, FeatureSet, GeometryBuilder, Properties, ShapeError, SHAPE_NAME,
};


//------------ Annotator -----------------------------------------------------

/// Adds semantic properties to the features of shapes.
///
/// Shapes carry their annotations in their names. Interpreting these is up
/// to implementations of this trait.
pub trait Annotator {
    /// Adds the properties for `shape` to `properties`.
    ///
    /// An error is recorded as a diagnostic. The feature is still created
    /// with whatever properties were added.
    fn annotate(
        &mut self, shape: &Shape, properties: &mut Properties
    ) -> Result<(), String>;
}

/// An annotator that adds nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAnnotations;

impl Annotator for NoAnnotations {
    fn annotate(
        &mut self, _shape: &Shape, _properties: &mut Properties
    ) -> Result<(), String> {
        Ok(())
    }
}


//------------ Layer ---------------------------------------------------------

/// The features extracted from one slide.
#[derive(Debug)]
pub struct Layer {
    pub id: String,
    pub description: String,

    /// The number of the slide the layer was made from.
    pub slide: usize,

    pub features: FeatureSet,
    pub diagnostics: Diagnostics,
}


//------------ Extractor -----------------------------------------------------

/// Turns slides into layers.
pub struct Extractor<'a, A = NoAnnotations> {
    presentation: &'a Presentation,
    annotator: A,
    layer_ids: HashSet<String>,
}

impl<'a> Extractor<'a> {
    pub fn new(presentation: &'a Presentation) -> Self {
        Self::with_annotator(presentation, NoAnnotations)
    }
}

impl<'a, A: Annotator> Extractor<'a, A> {
    pub fn with_annotator(presentation: &'a Presentation, annotator: A) -> Self {
        Extractor {
            presentation,
            annotator,
            layer_ids: HashSet::new(),
        }
    }

    /// The number of slides.
    pub fn len(&self) -> usize {
        self.presentation.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presentation.slides.is_empty()
    }

    /// The extent of a slide in flat map space.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            0., 0.,
            units::cm(self.presentation.size.width),
            units::cm(self.presentation.size.height),
        )
    }

    /// Extracts all slides.
    pub fn layers(&mut self) -> Result<Vec<Layer>, DocumentError> {
        (1..=self.len()).map(|number| self.slide_to_layer(number)).collect()
    }

    /// Extracts the slide with the given number.
    ///
    /// Slides are numbered from 1. Every layer id can only be used once.
    pub fn slide_to_layer(
        &mut self, number: usize
    ) -> Result<Layer, DocumentError> {
        let presentation = self.presentation;
        let slide = match presentation.slide(number) {
            Some(slide) => slide,
            None => return Err(DocumentError::MissingSlide(number)),
        };
        let id = slide.layer_id.clone().unwrap_or_else(|| {
            format!("layer-{:02}", number)
        });
        if !self.layer_ids.insert(id.clone()) {
            return Err(DocumentError::DuplicateLayer { id, slide: number })
        }
        let description = slide.description.clone().unwrap_or_else(|| {
            format!("Layer {}", number)
        });
        let mut diagnostics = Diagnostics::default();
        let features = self.process_slide(slide, number, &mut diagnostics);
        tracing::info!(
            "slide {}, layer {}: {} features, {} diagnostics",
            number, id, features.len(), diagnostics.len()
        );
        Ok(Layer { id, description, slide: number, features, diagnostics })
    }

    /// Walks the shape tree of a slide depth-first.
    ///
    /// Rather than recursing into groups, the walk keeps its own work list
    /// and a stack of the transforms of all currently entered groups.
    fn process_slide(
        &mut self,
        slide: &Slide,
        number: usize,
        diagnostics: &mut Diagnostics,
    ) -> FeatureSet {
        let mut features = FeatureSet::new();
        let mut transforms = TransformStack::new(units::emu_to_cm());
        let mut groups = vec![String::from("SLIDE")];
        let mut work: Vec<Step> = slide.shapes.iter().rev().map(
            Step::Enter
        ).collect();

        while let Some(step) = work.pop() {
            match step {
                Step::Enter(shape) => match shape.kind {
                    ShapeKind::Group(ref children) => {
                        let builder = GeometryBuilder::new(shape);
                        transforms.push(builder.local_transform());
                        groups.push(shape.name.clone());
                        work.push(Step::Leave {
                            shape, first_feature: features.len()
                        });
                        work.extend(children.iter().rev().map(Step::Enter));
                    }
                    ShapeKind::TextBox | ShapeKind::Picture => { }
                    _ => {
                        let builder = GeometryBuilder::new(shape);
                        let transform = transforms.resolve(
                            builder.local_transform()
                        );
                        let context = ShapeContext::new(number, &groups, shape);
                        match builder.build(transform) {
                            Ok(geometry) => {
                                let dropped = builder.dropped_lines();
                                if dropped > 0 {
                                    diagnostics.push(
                                        context.clone(),
                                        Problem::DroppedLines(dropped)
                                    );
                                }
                                let properties = self.properties(
                                    shape, &context, diagnostics
                                );
                                features.insert(Feature::new(
                                    shape.id, geometry, properties, false
                                ));
                            }
                            Err(err) => {
                                diagnostics.push(context, err.into());
                            }
                        }
                    }
                }
                Step::Leave { shape, first_feature } => {
                    let transform = transforms.current();
                    transforms.pop();
                    groups.pop();
                    if features.len() == first_feature {
                        continue
                    }
                    let context = ShapeContext::new(number, &groups, shape);
                    match GeometryBuilder::new(shape).build(transform) {
                        Ok(geometry) => {
                            let properties = self.properties(
                                shape, &context, diagnostics
                            );
                            features.insert(Feature::new(
                                shape.id, geometry, properties, true
                            ));
                        }
                        Err(err) => {
                            diagnostics.push(context, err.into());
                        }
                    }
                }
            }
        }
        features
    }

    fn properties(
        &mut self,
        shape: &Shape,
        context: &ShapeContext,
        diagnostics: &mut Diagnostics,
    ) -> Properties {
        let mut properties = Properties::new();
        properties.insert(SHAPE_NAME.into(), shape.name.clone());
        if let Err(err) = self.annotator.annotate(shape, &mut properties) {
            diagnostics.push(context.clone(), Problem::Annotation(err));
        }
        properties
    }
}


//------------ Step ----------------------------------------------------------

/// An item on the work list of the shape tree walk.
enum Step<'s> {
    Enter(&'s Shape),
    Leave { shape: &'s Shape, first_feature: usize },
}


//------------ Diagnostics ---------------------------------------------------

/// The problems encountered while extracting a layer.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, context: ShapeContext, problem: Problem) {
        let diagnostic = Diagnostic { context, problem };
        tracing::warn!("{}", diagnostic);
        self.entries.push(diagnostic)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.entries.iter()
    }
}


//------------ Diagnostic ----------------------------------------------------

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub context: ShapeContext,
    pub problem: Problem,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.problem)
    }
}


//------------ ShapeContext --------------------------------------------------

/// Where in a drawing a diagnostic happened.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShapeContext {
    pub slide: usize,

    /// The name of the innermost group containing the shape.
    pub group: String,

    pub shape_id: u32,
    pub shape_name: String,
}

impl ShapeContext {
    fn new(slide: usize, groups: &[String], shape: &Shape) -> Self {
        ShapeContext {
            slide,
            group: groups.last().cloned().unwrap_or_default(),
            shape_id: shape.id,
            shape_name: shape.name.clone(),
        }
    }
}

impl fmt::Display for ShapeContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f, "slide {}, group '{}', shape {} '{}'",
            self.slide, self.group, self.shape_id, self.shape_name
        )
    }
}


//------------ Problem -------------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Problem {
    Shape(ShapeError),

    /// Open sub-paths were left out of a polygon.
    DroppedLines(usize),

    Annotation(String),
}

impl From<ShapeError> for Problem {
    fn from(err: ShapeError) -> Self {
        Problem::Shape(err)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Problem::Shape(ref err) => err.fmt(f),
            Problem::DroppedLines(count) => {
                write!(f, "{} open sub-paths left out of polygon", count)
            }
            Problem::Annotation(ref err) => {
                write!(f, "annotation error: {}", err)
            }
        }
    }
}


//============ Testing =======================================================
