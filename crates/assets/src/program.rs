/// Shader source text for one program.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    label: String,
    vertex: String,
    fragment: String,
    changed: bool,
}

impl ShaderProgram {
    pub fn new(label: impl Into<String>, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            changed: true,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn vertex(&self) -> &str {
        &self.vertex
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Replaces both stages; a bound program is recompiled on next refresh.
    pub fn set_sources(&mut self, vertex: impl Into<String>, fragment: impl Into<String>) {
        self.vertex = vertex.into();
        self.fragment = fragment.into();
        self.changed = true;
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_applied(&mut self) {
        self.changed = false;
    }
}

/// Description of an offscreen render target.
#[derive(Debug, Clone)]
pub struct TargetDesc {
    label: String,
    width: u32,
    height: u32,
    clear_color: [f32; 4],
    changed: bool,
}

impl TargetDesc {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            changed: true,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
        self.changed = true;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.changed = true;
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_applied(&mut self) {
        self.changed = false;
    }
}
