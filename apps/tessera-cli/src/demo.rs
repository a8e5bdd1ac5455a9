use glam::Vec4;
use tessera_assets::{Image, Mesh, PropertySet, ShaderProgram, SourceStore, TargetDesc};
use tessera_binding::{BindingCache, CacheStats};
use tessera_gpu::HeadlessDevice;
use tessera_gpu::headless::Op;
use tessera_layout::LayoutBuilder;
use tessera_schedule::{FnTask, ProvidedTask, RenderContext, SchedulerConfig, TaskGraph, TaskQueue};

const VERTEX: &str = "layout(location = 0) in vec3 position;\nvoid main() { gl_Position = vec4(position, 1.0); }";
const FRAGMENT: &str = "uniform sampler2D albedo;\nout vec4 color;\nvoid main() { color = tint; }";

/// What a headless run reached the driver with.
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub frames: u32,
    pub order: Vec<String>,
    pub creates: usize,
    pub uploads: usize,
    pub draws: usize,
    pub cache: CacheStats,
    /// Smoothed render time per task, in milliseconds.
    pub averages: Vec<(String, f64)>,
}

/// Renders `frames` frames of a two-pass scene on the headless device.
///
/// Both passes draw the same quad; an update task animates the shared
/// property block before them every frame.
pub fn run(frames: u32) -> anyhow::Result<DemoReport> {
    let mut device = HeadlessDevice::new();
    let journal = device.journal();
    let mut cache = BindingCache::default();
    let mut sources = SourceStore::new();

    let mesh = sources.insert(Mesh::quad());
    let program = sources.insert(ShaderProgram::new("flat", VERTEX, FRAGMENT));
    let target = sources.insert(TargetDesc::new("main", 64, 64));
    let layout = LayoutBuilder::new()
        .field::<Vec4>("tint")
        .field::<f32>("time")
        .build()?;
    let params = sources.insert(PropertySet::new(layout));
    let albedo = sources.insert(Image::filled(2, 2, [255, 128, 0, 255]));

    let mut graph = TaskGraph::new();
    let mut frame = 0u32;
    let update = graph.insert(FnTask::new("update", move |ctx: &mut RenderContext<'_>| {
        let set = ctx.sources.get_mut::<PropertySet>(params)?;
        set.set("time", frame as f32)?;
        set.set("tint", Vec4::new(1.0, 0.5, 0.0, 1.0))?;
        frame += 1;
        Ok(())
    }));
    let mut passes = Vec::new();
    for label in ["opaque", "overlay"] {
        let mut task = ProvidedTask::new(label);
        task.set_shader(program);
        task.set_target(target);
        task.set_attributes(mesh);
        task.set_property("Params", params);
        task.set_texture_property("albedo", albedo);
        passes.push(graph.insert(task));
    }
    let (opaque, overlay) = (passes[0], passes[1]);
    graph.rely_on(opaque, update)?;
    graph.rely_on(overlay, opaque)?;

    let mut queue = TaskQueue::new(&SchedulerConfig {
        profiling: true,
        ..SchedulerConfig::default()
    });
    for id in [overlay, opaque, update] {
        queue.append(id);
    }
    queue.sort(&graph)?;

    for index in 0..frames {
        let _span = tracing::info_span!("frame", index).entered();
        let mut ctx = RenderContext::new(&mut device, &mut cache, &mut sources);
        queue.render(&mut graph, &mut ctx)?;
    }

    let order: Vec<String> = queue
        .order()
        .iter()
        .filter_map(|id| graph.label(*id))
        .map(str::to_string)
        .collect();
    let averages = queue
        .order()
        .iter()
        .filter_map(|id| Some((graph.label(*id)?.to_string(), queue.average(*id)?)))
        .collect();
    let journal = journal.borrow();
    Ok(DemoReport {
        frames,
        order,
        creates: journal.count(|op| matches!(op, Op::Create { .. } | Op::CreateTarget { .. })),
        uploads: journal.uploads(),
        draws: journal.draws(),
        cache: cache.stats(),
        averages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_render_after_the_update() {
        let report = run(1).unwrap();
        assert_eq!(report.order, vec!["update", "opaque", "overlay"]);
        assert_eq!(report.draws, 2);
        assert_eq!(report.averages.len(), 3);
    }

    #[test]
    fn later_frames_only_upload_the_animated_block() {
        let one = run(1).unwrap();
        let three = run(3).unwrap();
        assert_eq!(three.draws, 6);
        assert_eq!(three.creates, one.creates);
        assert_eq!(three.uploads, one.uploads + 2);
        assert!(three.cache.hits > one.cache.hits);
    }

    #[test]
    fn zero_frames_touch_nothing() {
        let report = run(0).unwrap();
        assert_eq!(report.creates, 0);
        assert_eq!(report.draws, 0);
        assert_eq!(report.cache, CacheStats::default());
        assert!(report.averages.is_empty());
    }
}
