//! Pre-lowering scan of expressions, for the capabilities they require and the
//! shader interface (input/output) variables they reference.

use crate::ast::visit::{InnerVisit, Visitor};
use crate::ast::{Expr, ImageAccess, ImageConfig, TextureAccess, Var};
use crate::{FxIndexMap, FxIndexSet};
use spirv::Capability;

/// Everything a module needs declared up-front, accumulated over any number
/// of [`scan_expr`] calls.
#[derive(Clone, Debug, Default)]
pub struct ModuleRequirements {
    pub capabilities: FxIndexSet<Capability>,

    /// Shader inputs, by name.
    pub inputs: FxIndexMap<String, Var>,

    /// Shader outputs (other than interface block members), by name.
    pub outputs: FxIndexMap<String, Var>,
}

impl ModuleRequirements {
    pub fn requires(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Adds the requirements of `expr` (and all its subexpressions) to `reqs`.
pub fn scan_expr(expr: &Expr, reqs: &mut ModuleRequirements) {
    Scanner { reqs }.visit_expr(expr);
}

struct Scanner<'r> {
    reqs: &'r mut ModuleRequirements,
}

impl Scanner<'_> {
    fn require(&mut self, capability: Capability) {
        self.reqs.capabilities.insert(capability);
    }

    /// Capabilities implied by just using an image of a given configuration.
    fn require_image_dim(&mut self, config: &ImageConfig, sampled: bool) {
        use spirv::Dim;

        let capability = match (config.dim, sampled) {
            (Dim::Dim1D, true) => Some(Capability::Sampled1D),
            (Dim::Dim1D, false) => Some(Capability::Image1D),
            (Dim::DimRect, true) => Some(Capability::SampledRect),
            (Dim::DimRect, false) => Some(Capability::ImageRect),
            (Dim::DimBuffer, true) => Some(Capability::SampledBuffer),
            (Dim::DimBuffer, false) => Some(Capability::ImageBuffer),
            (Dim::DimCube, true) if config.arrayed => Some(Capability::SampledCubeArray),
            (Dim::DimCube, false) if config.arrayed => Some(Capability::ImageCubeArray),
            _ => None,
        };
        self.require_all(capability);

        if !sampled && config.ms && config.arrayed {
            self.require(Capability::ImageMSArray);
        }
    }

    fn require_all(&mut self, capabilities: impl IntoIterator<Item = Capability>) {
        for capability in capabilities {
            self.require(capability);
        }
    }
}

impl<'a> Visitor<'a> for Scanner<'_> {
    fn visit_identifier(&mut self, var: &'a Var) {
        if var.ty.uses_double() {
            self.require(Capability::Float64);
        }
        if var.is_shader_input() {
            self.reqs.inputs.entry(var.name.clone()).or_insert_with(|| var.clone());
        } else if var.is_shader_output() && !var.is_member() {
            self.reqs.outputs.entry(var.name.clone()).or_insert_with(|| var.clone());
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        if expr.ty.uses_double() {
            self.require(Capability::Float64);
        }
        expr.inner_visit_with(self);
    }

    fn visit_image_access(&mut self, access: ImageAccess, args: &'a [Expr]) {
        if matches!(access, ImageAccess::Size | ImageAccess::Samples) {
            self.require(Capability::ImageQuery);
        }
        if let Some(config) = args.first().and_then(|image| image.ty.image_config()) {
            self.require_image_dim(config, false);
        }
        for arg in args {
            self.visit_expr(arg);
        }
    }

    fn visit_texture_access(&mut self, access: TextureAccess, args: &'a [Expr]) {
        if access.is_query() {
            self.require(Capability::ImageQuery);
        }
        if access.has_offset() {
            // NOTE: only a single constant offset is allowed by `Shader`.
            let dynamic_offset = args.last().map_or(false, |offset| !offset.is_constant());
            if access == TextureAccess::GatherOffsets || dynamic_offset {
                self.require(Capability::ImageGatherExtended);
            }
        }
        if let Some(config) = args.first().and_then(|image| image.ty.image_config()) {
            self.require_image_dim(config, true);
        }
        for arg in args {
            self.visit_expr(arg);
        }
    }
}
