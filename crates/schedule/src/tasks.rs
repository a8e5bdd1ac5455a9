use crate::graph::{RenderContext, RenderTask};
use tessera_assets::{Image, Mesh, PropertySet, ShaderProgram, TargetDesc};
use tessera_binding::Bindable;
use tessera_common::{Error, Result, SourceId};
use tessera_gpu::{AttributeBuffers, GpuBuffer, GpuShader, GpuTarget, GpuTexture, Shared};

/// Replaces the value under `name`, or appends it.
fn upsert<T>(entries: &mut Vec<(String, T)>, name: &str, value: T) {
    match entries.iter_mut().find(|(n, _)| n == name) {
        Some((_, slot)) => *slot = value,
        None => entries.push((name.to_string(), value)),
    }
}

/// One draw: a shader, its target, the attributes to draw and the blocks
/// and textures bound to the shader.
///
/// Textures take units in the order they were first set.
#[derive(Debug, Default)]
pub struct ShaderTask {
    label: String,
    shader: Option<Shared<GpuShader>>,
    target: Option<Shared<GpuTarget>>,
    attributes: Option<Shared<AttributeBuffers>>,
    properties: Vec<(String, Shared<GpuBuffer>)>,
    textures: Vec<(String, Shared<GpuTexture>)>,
}

impl ShaderTask {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn set_shader(&mut self, shader: Shared<GpuShader>) {
        self.shader = Some(shader);
    }

    pub fn set_target(&mut self, target: Shared<GpuTarget>) {
        self.target = Some(target);
    }

    pub fn set_attributes(&mut self, attributes: Shared<AttributeBuffers>) {
        self.attributes = Some(attributes);
    }

    /// Binds a uniform block under `name`.
    pub fn set_property(&mut self, name: &str, block: Shared<GpuBuffer>) {
        upsert(&mut self.properties, name, block);
    }

    pub fn set_texture_property(&mut self, name: &str, texture: Shared<GpuTexture>) {
        upsert(&mut self.textures, name, texture);
    }

    pub fn shader(&self) -> Option<&Shared<GpuShader>> {
        self.shader.as_ref()
    }

    pub fn target(&self) -> Option<&Shared<GpuTarget>> {
        self.target.as_ref()
    }

    pub fn attributes(&self) -> Option<&Shared<AttributeBuffers>> {
        self.attributes.as_ref()
    }

    fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.shader.is_none() {
            missing.push("shader");
        }
        if self.target.is_none() {
            missing.push("target");
        }
        if self.attributes.is_none() {
            missing.push("attributes");
        }
        missing
    }

    /// Issues the draw. Returns `false` without touching the driver when
    /// the shader, target or attributes are unset.
    pub fn draw(&self) -> Result<bool> {
        let (Some(shader), Some(target), Some(attributes)) =
            (&self.shader, &self.target, &self.attributes)
        else {
            tracing::warn!(task = %self.label, missing = ?self.missing(), "skipping draw");
            return Ok(false);
        };

        target.borrow_mut().bind()?;
        let mut shader = shader.borrow_mut();
        shader.bind()?;
        for (name, block) in &self.properties {
            shader.set_block(name, &mut block.borrow_mut())?;
        }
        for (unit, (name, texture)) in self.textures.iter().enumerate() {
            shader.set_texture(name, unit as u32, &mut texture.borrow_mut())?;
        }
        shader.draw(&mut attributes.borrow_mut())?;
        Ok(true)
    }
}

impl RenderTask for ShaderTask {
    fn label(&self) -> &str {
        &self.label
    }

    fn render(&mut self, _ctx: &mut RenderContext<'_>) -> Result<()> {
        self.draw().map(|_| ())
    }
}

/// A [`ShaderTask`] fed from CPU sources.
///
/// Each render binds every input through the context's binding cache and
/// refreshes it, so edits to a source show up in the next frame.
#[derive(Debug, Default)]
pub struct ProvidedTask {
    bound: ShaderTask,
    shader: Option<SourceId>,
    target: Option<SourceId>,
    attributes: Option<SourceId>,
    properties: Vec<(String, SourceId)>,
    textures: Vec<(String, SourceId)>,
}

fn bind_fresh<S: Bindable>(ctx: &mut RenderContext<'_>, id: SourceId) -> Result<Shared<S::Asset>> {
    let asset = ctx.cache.bind::<S>(&mut *ctx.device, ctx.sources, id)?;
    ctx.cache.refresh::<S>(ctx.sources, id)?;
    Ok(asset)
}

impl ProvidedTask {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            bound: ShaderTask::new(label),
            ..Self::default()
        }
    }

    pub fn set_shader(&mut self, program: SourceId) {
        self.shader = Some(program);
    }

    pub fn set_target(&mut self, target: SourceId) {
        self.target = Some(target);
    }

    pub fn set_attributes(&mut self, mesh: SourceId) {
        self.attributes = Some(mesh);
    }

    pub fn set_property(&mut self, name: &str, properties: SourceId) {
        upsert(&mut self.properties, name, properties);
    }

    pub fn set_texture_property(&mut self, name: &str, image: SourceId) {
        upsert(&mut self.textures, name, image);
    }

    /// The assets resolved by the last render.
    pub fn bound(&self) -> &ShaderTask {
        &self.bound
    }

    fn resolve(&mut self, ctx: &mut RenderContext<'_>) -> Result<()> {
        if let Some(id) = self.shader {
            let shader = bind_fresh::<ShaderProgram>(ctx, id)?;
            self.bound.set_shader(shader);
        }
        if let Some(id) = self.target {
            let target = bind_fresh::<TargetDesc>(ctx, id)?;
            self.bound.set_target(target);
        }
        if let Some(id) = self.attributes {
            let attributes = bind_fresh::<Mesh>(ctx, id)?;
            self.bound.set_attributes(attributes);
        }
        for (name, id) in &self.properties {
            let block = bind_fresh::<PropertySet>(ctx, *id)?;
            self.bound.set_property(name, block);
        }
        for (name, id) in &self.textures {
            let texture = bind_fresh::<Image>(ctx, *id)?;
            self.bound.set_texture_property(name, texture);
        }
        Ok(())
    }
}

impl RenderTask for ProvidedTask {
    fn label(&self) -> &str {
        &self.bound.label
    }

    /// An input whose source was removed skips this draw with a warning;
    /// every other resolve error is returned.
    fn render(&mut self, ctx: &mut RenderContext<'_>) -> Result<()> {
        match self.resolve(ctx) {
            Ok(()) => self.bound.draw().map(|_| ()),
            Err(Error::UnknownSource(id)) => {
                tracing::warn!(task = %self.bound.label, %id, "input source removed, skipping draw");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TaskGraph;
    use crate::queue::TaskQueue;
    use glam::Vec4;
    use std::rc::Rc;
    use tessera_assets::SourceStore;
    use tessera_binding::BindingCache;
    use tessera_gpu::headless::{FailPoint, Op};
    use tessera_gpu::{BufferUsage, Destination, Extent, HeadlessDevice, shared};
    use tessera_layout::LayoutBuilder;

    struct Scene {
        device: HeadlessDevice,
        cache: BindingCache,
        sources: SourceStore,
    }

    impl Scene {
        fn new() -> Self {
            Self {
                device: HeadlessDevice::new(),
                cache: BindingCache::default(),
                sources: SourceStore::new(),
            }
        }

        fn ctx(&mut self) -> RenderContext<'_> {
            RenderContext::new(&mut self.device, &mut self.cache, &mut self.sources)
        }

        fn draws(&self) -> usize {
            self.device.journal().borrow().draws()
        }
    }

    fn bound_task(device: &mut HeadlessDevice) -> ShaderTask {
        let mut task = ShaderTask::new("direct");
        task.set_shader(shared(GpuShader::new(device, "flat", "vs", "fs")));
        task.set_target(shared(
            GpuTarget::new(device, "main", Extent::new(4, 4)).unwrap(),
        ));
        let mut positions = GpuBuffer::new(device, "tri/position", BufferUsage::Vertex);
        positions.write(&[0; 36]).unwrap();
        let mut attributes = AttributeBuffers::new("tri", 3);
        attributes.add_stream(0, 3, positions);
        task.set_attributes(shared(attributes));
        task
    }

    #[test]
    fn missing_shader_skips_without_error() {
        let mut scene = Scene::new();
        let mut task = ShaderTask::new("incomplete");
        task.set_target(shared(
            GpuTarget::new(&mut scene.device, "main", Extent::new(4, 4)).unwrap(),
        ));
        assert!(!task.draw().unwrap());
        task.render(&mut scene.ctx()).unwrap();
        assert_eq!(scene.draws(), 0);
        assert!(scene.device.journal().borrow().ops().is_empty());
    }

    #[test]
    fn complete_task_binds_then_draws() {
        let mut scene = Scene::new();
        let mut task = bound_task(&mut scene.device);
        let mut block = GpuBuffer::new(&mut scene.device, "params", BufferUsage::Uniform);
        block.write(&[0; 16]).unwrap();
        task.set_property("Params", shared(block));
        let mut texture = GpuTexture::new(&mut scene.device, "albedo");
        texture.set_extent(Extent::new(1, 1)).unwrap();
        task.set_texture_property("albedo", shared(texture));

        task.render(&mut scene.ctx()).unwrap();

        let journal = scene.device.journal();
        let journal = journal.borrow();
        let sequence: Vec<&str> = journal
            .ops()
            .iter()
            .filter_map(|op| match op {
                Op::BindTarget { .. } => Some("target"),
                Op::BindShader { .. } => Some("shader"),
                Op::SetBlock { .. } => Some("block"),
                Op::SetTexture { unit: 0, .. } => Some("texture0"),
                Op::Draw { .. } => Some("draw"),
                _ => None,
            })
            .collect();
        assert_eq!(sequence, vec!["target", "shader", "block", "texture0", "draw"]);
    }

    #[test]
    fn driver_errors_propagate_from_draw() {
        let mut scene = Scene::new();
        let task = bound_task(&mut scene.device);
        scene.device.fail_next(FailPoint::Draw);
        assert!(matches!(task.draw(), Err(Error::Driver(_))));
    }

    fn provided_scene(scene: &mut Scene) -> (SourceId, ProvidedTask, ProvidedTask) {
        let mesh = scene.sources.insert(Mesh::quad());
        let program = scene.sources.insert(ShaderProgram::new("flat", "vs", "fs"));
        let target = scene.sources.insert(TargetDesc::new("main", 16, 16));
        let layout = LayoutBuilder::new().field::<Vec4>("tint").build().unwrap();
        let params = scene.sources.insert(PropertySet::new(layout));

        let mut tasks = Vec::new();
        for label in ["left", "right"] {
            let mut task = ProvidedTask::new(label);
            task.set_shader(program);
            task.set_target(target);
            task.set_attributes(mesh);
            task.set_property("Params", params);
            tasks.push(task);
        }
        let right = tasks.pop().unwrap();
        let left = tasks.pop().unwrap();
        (params, left, right)
    }

    #[test]
    fn provided_tasks_share_one_mesh() {
        let mut scene = Scene::new();
        let (_, left, right) = provided_scene(&mut scene);
        let mut graph = TaskGraph::new();
        let left = graph.insert(left);
        let right = graph.insert(right);
        graph.rely_on(right, left).unwrap();
        let mut queue = TaskQueue::default();
        queue.append(right);
        queue.append(left);
        queue.sort(&graph).unwrap();

        queue.render(&mut graph, &mut scene.ctx()).unwrap();

        let a = graph.get::<ProvidedTask>(left).unwrap().bound().attributes().unwrap();
        let b = graph.get::<ProvidedTask>(right).unwrap().bound().attributes().unwrap();
        assert!(Rc::ptr_eq(a, b));
        assert_eq!(scene.draws(), 2);
        // mesh, shader, target, params
        assert_eq!(scene.cache.len(), 4);
    }

    #[test]
    fn provided_task_uploads_edits_once_per_frame() {
        let mut scene = Scene::new();
        let (params, mut left, _) = provided_scene(&mut scene);
        left.render(&mut scene.ctx()).unwrap();
        let journal = scene.device.journal();
        journal.borrow_mut().clear();

        left.render(&mut scene.ctx()).unwrap();
        assert_eq!(journal.borrow().uploads(), 0);

        let set = scene.sources.get_mut::<PropertySet>(params).unwrap();
        set.set("tint", Vec4::ONE).unwrap();
        set.set("tint", Vec4::ZERO).unwrap();
        left.render(&mut scene.ctx()).unwrap();
        assert_eq!(journal.borrow().uploads(), 1);
    }

    #[test]
    fn provided_task_without_attributes_is_skipped() {
        let mut scene = Scene::new();
        let program = scene.sources.insert(ShaderProgram::new("flat", "vs", "fs"));
        let mut task = ProvidedTask::new("partial");
        task.set_shader(program);
        task.render(&mut scene.ctx()).unwrap();
        assert_eq!(scene.draws(), 0);
        assert!(task.bound().shader().is_some());
    }

    #[test]
    fn removed_input_skips_only_that_draw() {
        let mut scene = Scene::new();
        let (_, left, mut right) = provided_scene(&mut scene);
        let lonely = scene.sources.insert(Mesh::quad());
        right.set_attributes(lonely);

        let mut graph = TaskGraph::new();
        let left = graph.insert(left);
        let right = graph.insert(right);
        let mut queue = TaskQueue::default();
        queue.append(right);
        queue.append(left);
        queue.sort(&graph).unwrap();
        queue.render(&mut graph, &mut scene.ctx()).unwrap();
        assert_eq!(scene.draws(), 2);

        scene.sources.remove(lonely);
        queue.render(&mut graph, &mut scene.ctx()).unwrap();
        assert_eq!(scene.draws(), 3);
    }

    #[test]
    fn provided_task_reports_type_mismatch() {
        let mut scene = Scene::new();
        let image = scene.sources.insert(Image::filled(1, 1, [0; 4]));
        let mut task = ProvidedTask::new("wrong");
        task.set_attributes(image);
        assert!(matches!(
            task.render(&mut scene.ctx()),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
