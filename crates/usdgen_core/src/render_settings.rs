//! UsdRender settings, products and vars under `/Render`.

use std::path::Path;

use crate::scene::{to_posix, SceneError, SceneResult};
use crate::usd::{PrimPath, Stage, TargetPath, Value};

/// Authors render settings prims under a render scope.
#[derive(Clone, Debug)]
pub struct RenderSettingsManager {
    root: PrimPath,
}

impl RenderSettingsManager {
    /// Define the `/Render` scope.
    pub fn new(stage: &mut Stage) -> SceneResult<Self> {
        Self::with_root(stage, PrimPath::new("/Render")?)
    }

    pub fn with_root(stage: &mut Stage, root: PrimPath) -> SceneResult<Self> {
        stage.define_prim(&root, "Scope")?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &PrimPath {
        &self.root
    }

    /// Define a `RenderSettings` prim and make it the stage's render settings.
    pub fn create_basic_render_settings(
        &self,
        stage: &mut Stage,
        name: &str,
        camera: &PrimPath,
        resolution: [i32; 2],
        products: &[PrimPath],
    ) -> SceneResult<PrimPath> {
        check_resolution(resolution)?;
        stage.typed_prim(camera, "Camera")?;

        let path = self.root.child(name)?;
        let settings = stage.define_prim(&path, "RenderSettings")?;
        settings.set_uniform("resolution", Value::Int2(resolution))?;
        settings.set_relationship("camera", vec![TargetPath::prim(camera.clone())])?;
        if !products.is_empty() {
            settings.set_relationship("products", targets(products))?;
        }

        stage.metadata.render_settings_prim_path = Some(path.clone());
        Ok(path)
    }

    /// Define a `RenderProduct` writing to `output_path`.
    ///
    /// The product name is the absolute output path with forward slashes.
    pub fn create_render_product(
        &self,
        stage: &mut Stage,
        name: &str,
        camera: &PrimPath,
        output_path: &Path,
        ordered_vars: &[PrimPath],
    ) -> SceneResult<PrimPath> {
        stage.typed_prim(camera, "Camera")?;
        let absolute = std::path::absolute(output_path).map_err(|source| SceneError::Io {
            path: output_path.to_path_buf(),
            source,
        })?;

        let path = self.root.child(name)?;
        let product = stage.define_prim(&path, "RenderProduct")?;
        product.set("productName", Value::token(to_posix(&absolute)))?;
        product.set_relationship("camera", vec![TargetPath::prim(camera.clone())])?;
        if !ordered_vars.is_empty() {
            product.set_relationship("orderedVars", targets(ordered_vars))?;
        }
        Ok(path)
    }

    /// Define a `RenderVar` at `<root>/Vars/<name>`.
    pub fn create_render_var(
        &self,
        stage: &mut Stage,
        name: &str,
        source_name: &str,
        data_type: &str,
        source_type: Option<&str>,
    ) -> SceneResult<PrimPath> {
        let path = self.root.child("Vars")?.child(name)?;
        let var = stage.define_prim(&path, "RenderVar")?;
        var.set_uniform("sourceName", Value::String(source_name.to_string()))?;
        var.set_uniform("dataType", Value::token(data_type))?;
        if let Some(source_type) = source_type {
            var.set_uniform("sourceType", Value::token(source_type))?;
        }
        Ok(path)
    }
}

fn targets(paths: &[PrimPath]) -> Vec<TargetPath> {
    paths.iter().cloned().map(TargetPath::prim).collect()
}

fn check_resolution(resolution: [i32; 2]) -> SceneResult<()> {
    if resolution.iter().any(|&v| v <= 0) {
        return Err(SceneError::InvalidParameter(format!(
            "resolution must be positive, got {}x{}",
            resolution[0], resolution[1]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraParams, CameraRig};

    fn setup() -> (Stage, RenderSettingsManager, PrimPath) {
        let mut stage = Stage::new();
        let camera = CameraRig::new()
            .unwrap()
            .add_camera(&mut stage, &CameraParams::default())
            .unwrap();
        let render = RenderSettingsManager::new(&mut stage).unwrap();
        (stage, render, camera)
    }

    #[test]
    fn test_render_settings_metadata() {
        let (mut stage, render, camera) = setup();
        let path = render
            .create_basic_render_settings(&mut stage, "Settings", &camera, [1920, 1080], &[])
            .unwrap();
        assert_eq!(path.as_str(), "/Render/Settings");
        assert_eq!(stage.metadata.render_settings_prim_path.as_ref(), Some(&path));

        let text = stage.export_to_string();
        assert!(text.contains("renderSettingsPrimPath = \"/Render/Settings\""));
        assert!(text.contains("uniform int2 resolution = (1920, 1080)"));
        assert!(text.contains("rel camera = </World/Cameras/Camera>"));
        assert!(!text.contains("rel products"));
    }

    #[test]
    fn test_product_and_vars() {
        let (mut stage, render, camera) = setup();
        let beauty = render
            .create_render_var(&mut stage, "Beauty", "Ci", "color3f", Some("raw"))
            .unwrap();
        let depth = render
            .create_render_var(&mut stage, "Depth", "z", "float", None)
            .unwrap();
        assert_eq!(beauty.as_str(), "/Render/Vars/Beauty");

        let product = render
            .create_render_product(
                &mut stage,
                "Product",
                &camera,
                Path::new("renders/beauty.exr"),
                &[beauty, depth.clone()],
            )
            .unwrap();
        render
            .create_basic_render_settings(&mut stage, "Settings", &camera, [512, 512], &[product.clone()])
            .unwrap();

        let prim = stage.prim(&product).unwrap();
        let name = prim.attribute("productName").unwrap().value().unwrap().as_str().unwrap();
        assert!(name.ends_with("renders/beauty.exr"));
        assert!(Path::new(name).is_absolute());
        assert_eq!(prim.relationship("orderedVars").unwrap().targets.len(), 2);

        let var = stage.prim(&depth).unwrap();
        assert!(var.attribute("sourceType").is_none());
        let text = stage.export_to_string();
        assert!(text.contains("uniform string sourceName = \"Ci\""));
        assert!(text.contains("uniform token dataType = \"float\""));
    }

    #[test]
    fn test_rejects_bad_settings() {
        let (mut stage, render, camera) = setup();
        assert!(render
            .create_basic_render_settings(&mut stage, "Zero", &camera, [0, 512], &[])
            .is_err());

        let not_camera = render.root().clone();
        assert!(render
            .create_basic_render_settings(&mut stage, "Settings", &not_camera, [512, 512], &[])
            .is_err());
        assert!(stage.metadata.render_settings_prim_path.is_none());
    }
}
