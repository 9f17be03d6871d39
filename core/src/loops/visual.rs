//! 视觉：帧构建与矩形渲染
//!
//! - `build_frame`：由按键状态、连接状态与当前音色构建实例列表（窗口像素）
//! - `Renderer`：实例化绘制矩形

mod glyph;
mod gpu;
pub use gpu::{GpuContext, init_gpu};

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::Instance;
use crate::key::{DisplayTransform, Key};
use crate::layout::{Color, Rect, WHITE, rgb};

/// 连接状态指示块边长（窗口像素）
const INDICATOR_SIZE: f32 = 32.0;
/// 已连接
const CONNECTED: Color = rgb(0, 255, 0);
/// 未连接
const DISCONNECTED: Color = rgb(255, 0, 0);
/// 自动轮换箭头颜色
const ARROW: Color = rgb(0, 128, 255);
/// 箭头头部切片数
const ARROW_HEAD_SLICES: usize = 6;
/// 音色名距窗口左边与下边的距离（窗口像素）
const FOLDER_MARGIN: f32 = 8.0;
/// 音色名每个点的边长（窗口像素）
const FOLDER_SCALE: f32 = 3.0;
/// 实例缓冲容量
const MAX_INSTANCES: usize = 1024;

/// 构建一帧的绘制实例
///
/// 先画全部白键再画全部黑键，黑键始终覆盖在白键之上；
/// 然后叠加连接指示块与自动轮换箭头，最后在左下角写出当前音色目录名。
#[must_use]
pub fn build_frame<S>(
    keys: &[Key<S>],
    transform: &DisplayTransform,
    connected: bool,
    arrow_visible: bool,
    folder: Option<&str>,
) -> Vec<Instance> {
    let mut out = Vec::with_capacity(keys.len() * 2 + 2 + ARROW_HEAD_SLICES);
    for z in [0, 1] {
        for key in keys.iter().filter(|k| k.z_order() == z) {
            key.render(transform, &mut out);
        }
    }
    let indicator = if connected { CONNECTED } else { DISCONNECTED };
    out.push(Instance::from_rect(
        Rect::new(0.0, 0.0, INDICATOR_SIZE, INDICATOR_SIZE),
        indicator,
    ));
    if arrow_visible {
        push_arrow(INDICATOR_SIZE, 0.0, INDICATOR_SIZE, &mut out);
    }
    if let Some(name) = folder {
        glyph::push_text(
            name,
            FOLDER_MARGIN,
            transform.window.1 - FOLDER_MARGIN,
            FOLDER_SCALE,
            WHITE,
            &mut out,
        );
    }
    out
}

/// 在 `size` 见方的区域内画一个向右的箭头：矩形箭身加逐级变窄的箭头切片
fn push_arrow(x: f32, y: f32, size: f32, out: &mut Vec<Instance>) {
    let shaft_len = size * 0.625;
    let shaft_h = size * 0.25;
    out.push(Instance::from_rect(
        Rect::new(x, y + (size - shaft_h) / 2.0, shaft_len, shaft_h),
        ARROW,
    ));
    let head_len = size - shaft_len;
    let slice_w = head_len / ARROW_HEAD_SLICES as f32;
    for i in 0..ARROW_HEAD_SLICES {
        let h = size * (ARROW_HEAD_SLICES - i) as f32 / ARROW_HEAD_SLICES as f32;
        out.push(Instance::from_rect(
            Rect::new(
                x + shaft_len + slice_w * i as f32,
                y + (size - h) / 2.0,
                slice_w,
                h,
            ),
            ARROW,
        ));
    }
}

#[repr(C)]
#[derive(Clone, Copy, Zeroable, Pod)]
/// 着色器中的屏幕尺寸（宽, 高）
struct ScreenUniform {
    size: [f32; 2],
}

impl ScreenUniform {
    fn of(config: &wgpu::SurfaceConfiguration) -> Self {
        Self {
            size: [config.width as f32, config.height as f32],
        }
    }
}

/// 单位四边形，中心在原点
const QUAD: [[f32; 2]; 4] = [[-0.5, -0.5], [0.5, -0.5], [0.5, 0.5], [-0.5, 0.5]];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];
const QUAD_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
/// 与 `Instance` 的字段顺序一致：中心、尺寸、颜色
const INSTANCE_ATTRS: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![1 => Float32x2, 2 => Float32x2, 3 => Float32x4];

/// 矩形渲染器：每帧上传实例并以一次实例化绘制完成
pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    screen: (wgpu::Buffer, wgpu::BindGroup),
    quad: (wgpu::Buffer, wgpu::Buffer),
    instances: wgpu::Buffer,
}

impl Renderer {
    /// 配置表面并创建管线与缓冲
    #[must_use]
    pub fn new(ctx: GpuContext) -> Self {
        let GpuContext {
            surface,
            device,
            queue,
            config,
        } = ctx;
        surface.configure(&device, &config);

        let screen_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("screen"),
            contents: bytemuck::bytes_of(&ScreenUniform::of(&config)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("screen"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("screen"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_buf.as_entire_binding(),
            }],
        });
        let pipeline = rect_pipeline(&device, config.format, &layout);

        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad-indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        let instances = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instances"),
            size: (std::mem::size_of::<Instance>() * MAX_INSTANCES) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            screen: (screen_buf, bind_group),
            quad: (vertices, indices),
            instances,
        }
    }

    /// 绘制一帧实例，超出缓冲容量的部分被丢弃
    ///
    /// # Errors
    ///
    /// - 获取表面纹理失败
    pub fn draw(&self, instances: &[Instance]) -> Result<()> {
        let instances = instances.get(..MAX_INSTANCES).unwrap_or(instances);
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.queue
            .write_buffer(&self.instances, 0, bytemuck::cast_slice(instances));
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rects"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.screen.1, &[]);
            pass.set_vertex_buffer(0, self.quad.0.slice(..));
            pass.set_vertex_buffer(1, self.instances.slice(..));
            pass.set_index_buffer(self.quad.1.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(
                0..QUAD_INDICES.len() as u32,
                0,
                0..instances.len() as u32,
            );
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// 重新配置表面并更新屏幕尺寸；最小化时尺寸为 0，保持原配置
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.queue.write_buffer(
            &self.screen.0,
            0,
            bytemuck::bytes_of(&ScreenUniform::of(&self.config)),
        );
    }
}

/// 实例化矩形管线：顶点缓冲 0 为单位四边形，缓冲 1 为逐实例数据
fn rect_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::include_wgsl!("../rect.wgsl"));
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("rects"),
        bind_group_layouts: &[layout],
        immediate_size: 0,
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("rects"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[
                wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &QUAD_ATTRS,
                },
                wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Instance>() as u64,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &INSTANCE_ATTRS,
                },
            ],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(format.into())],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
