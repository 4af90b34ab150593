//! Vulkan backend built on ash.
//!
//! Records into native secondary and primary command buffers allocated
//! from a command pool owned by the embedding layer. Device and queue
//! ownership stay outside this crate; the backend only needs a logical
//! device and a pool to allocate from.

use ash::vk;

use crate::backend::{
    CommandBackend, FramebufferHandle, PrimaryCommands, RenderPassBegin, RenderPassHandle,
    RenderPassInheritance, SecondaryCommands,
};
use crate::error::GraphicsError;
use crate::render_pass::RenderPassDescriptor;
use crate::types::{ClearValue, TextureFormat};

/// Vulkan implementation of the command backend.
pub struct VulkanBackend {
    device: ash::Device,
    command_pool: vk::CommandPool,
}

impl VulkanBackend {
    /// Create a backend recording into buffers from `command_pool`.
    ///
    /// The caller keeps ownership of the device and the pool, and must
    /// keep both alive for the backend's lifetime.
    pub fn new(device: ash::Device, command_pool: vk::CommandPool) -> Self {
        log::debug!("Creating Vulkan command backend");
        Self {
            device,
            command_pool,
        }
    }

    fn allocate_command_buffer(
        &self,
        level: vk::CommandBufferLevel,
    ) -> Result<vk::CommandBuffer, GraphicsError> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(level)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&allocate_info) }
            .map_err(|err| GraphicsError::AllocationFailed(err.to_string()))?;
        buffers
            .into_iter()
            .next()
            .ok_or_else(|| GraphicsError::AllocationFailed("no buffer allocated".to_string()))
    }
}

fn convert_texture_format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::Depth32Float => vk::Format::D32_SFLOAT,
        TextureFormat::Depth24PlusStencil8 => vk::Format::D24_UNORM_S8_UINT,
    }
}

fn convert_sample_count(samples: u32) -> Result<vk::SampleCountFlags, GraphicsError> {
    match samples {
        1 => Ok(vk::SampleCountFlags::TYPE_1),
        2 => Ok(vk::SampleCountFlags::TYPE_2),
        4 => Ok(vk::SampleCountFlags::TYPE_4),
        8 => Ok(vk::SampleCountFlags::TYPE_8),
        16 => Ok(vk::SampleCountFlags::TYPE_16),
        other => Err(GraphicsError::RenderPassResolutionFailed(format!(
            "unsupported sample count: {other}"
        ))),
    }
}

fn convert_clear_value(clear: ClearValue) -> vk::ClearValue {
    match clear {
        ClearValue::Color(float32) => vk::ClearValue {
            color: vk::ClearColorValue { float32 },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

fn vk_render_pass(handle: &RenderPassHandle) -> vk::RenderPass {
    match handle {
        RenderPassHandle::Vulkan(render_pass) => *render_pass,
        RenderPassHandle::Dummy(_) => {
            panic!("Vulkan backend was handed a dummy render pass")
        }
    }
}

fn vk_framebuffer(handle: &FramebufferHandle) -> vk::Framebuffer {
    match handle {
        FramebufferHandle::Vulkan(framebuffer) => *framebuffer,
        FramebufferHandle::Dummy(_) => {
            panic!("Vulkan backend was handed a dummy framebuffer")
        }
    }
}

fn vk_secondary(commands: &SecondaryCommands) -> vk::CommandBuffer {
    match commands {
        SecondaryCommands::Vulkan { buffer, .. } => *buffer,
        SecondaryCommands::Dummy(_) => {
            panic!("Vulkan backend was handed a dummy command buffer")
        }
    }
}

fn vk_primary(primary: &PrimaryCommands) -> vk::CommandBuffer {
    match primary {
        PrimaryCommands::Vulkan { buffer, .. } => *buffer,
        PrimaryCommands::Dummy(_) => {
            panic!("Vulkan backend was handed a dummy command buffer")
        }
    }
}

impl CommandBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan"
    }

    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<RenderPassHandle, GraphicsError> {
        let samples = convert_sample_count(descriptor.sample_count())?;

        let mut attachments = Vec::with_capacity(descriptor.attachment_count());
        let mut color_refs = Vec::with_capacity(descriptor.color_formats().len());
        for &format in descriptor.color_formats() {
            color_refs.push(
                vk::AttachmentReference::default()
                    .attachment(attachments.len() as u32)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            );
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(convert_texture_format(format))
                    .samples(samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            );
        }

        let depth_ref;
        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(format) = descriptor.depth_stencil_format() {
            depth_ref = vk::AttachmentReference::default()
                .attachment(attachments.len() as u32)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(convert_texture_format(format))
                    .samples(samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
                    .stencil_store_op(vk::AttachmentStoreOp::STORE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }

        let subpasses = [subpass];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses);
        let render_pass = unsafe { self.device.create_render_pass(&create_info, None) }
            .map_err(|err| GraphicsError::RenderPassResolutionFailed(err.to_string()))?;
        Ok(RenderPassHandle::Vulkan(render_pass))
    }

    fn begin_secondary(
        &self,
        inheritance: Option<&RenderPassInheritance<'_>>,
    ) -> Result<SecondaryCommands, GraphicsError> {
        let buffer = self.allocate_command_buffer(vk::CommandBufferLevel::SECONDARY)?;

        let mut inheritance_info = vk::CommandBufferInheritanceInfo::default();
        let mut flags = vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT;
        if let Some(inheritance) = inheritance {
            inheritance_info = inheritance_info
                .render_pass(vk_render_pass(inheritance.render_pass))
                .framebuffer(vk_framebuffer(inheritance.framebuffer))
                .subpass(0);
            flags |= vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE;
        }
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(flags)
            .inheritance_info(&inheritance_info);
        unsafe { self.device.begin_command_buffer(buffer, &begin_info) }
            .map_err(|err| GraphicsError::AllocationFailed(err.to_string()))?;

        Ok(SecondaryCommands::Vulkan {
            device: self.device.clone(),
            buffer,
        })
    }

    fn end_secondary(&self, commands: &mut SecondaryCommands) -> Result<(), GraphicsError> {
        let buffer = vk_secondary(commands);
        unsafe { self.device.end_command_buffer(buffer) }
            .map_err(|err| GraphicsError::AllocationFailed(err.to_string()))
    }

    fn begin_primary(&self) -> Result<PrimaryCommands, GraphicsError> {
        let buffer = self.allocate_command_buffer(vk::CommandBufferLevel::PRIMARY)?;
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(buffer, &begin_info) }
            .map_err(|err| GraphicsError::AllocationFailed(err.to_string()))?;
        Ok(PrimaryCommands::Vulkan {
            device: self.device.clone(),
            buffer,
        })
    }

    fn end_primary(&self, primary: &mut PrimaryCommands) -> Result<(), GraphicsError> {
        let buffer = vk_primary(primary);
        unsafe { self.device.end_command_buffer(buffer) }
            .map_err(|err| GraphicsError::AllocationFailed(err.to_string()))
    }

    fn execute_secondary(&self, primary: &mut PrimaryCommands, commands: &SecondaryCommands) {
        let primary = vk_primary(primary);
        let secondary = [vk_secondary(commands)];
        unsafe { self.device.cmd_execute_commands(primary, &secondary) };
    }

    fn begin_render_pass(&self, primary: &mut PrimaryCommands, begin: &RenderPassBegin<'_>) {
        let buffer = vk_primary(primary);
        let clear_values: Vec<vk::ClearValue> = begin
            .clear_values
            .iter()
            .copied()
            .map(convert_clear_value)
            .collect();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D {
                x: begin.render_area.x,
                y: begin.render_area.y,
            },
            extent: vk::Extent2D {
                width: begin.render_area.width,
                height: begin.render_area.height,
            },
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_render_pass(begin.render_pass))
            .framebuffer(vk_framebuffer(begin.framebuffer))
            .render_area(render_area)
            .clear_values(&clear_values);
        unsafe {
            self.device.cmd_begin_render_pass(
                buffer,
                &begin_info,
                // Pass contents come from the nodes' secondary buffers.
                vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
            )
        };
    }

    fn end_render_pass(&self, primary: &mut PrimaryCommands) {
        let buffer = vk_primary(primary);
        unsafe { self.device.cmd_end_render_pass(buffer) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_conversion() {
        assert_eq!(
            convert_texture_format(TextureFormat::Bgra8Unorm),
            vk::Format::B8G8R8A8_UNORM
        );
        assert_eq!(
            convert_texture_format(TextureFormat::Depth24PlusStencil8),
            vk::Format::D24_UNORM_S8_UINT
        );
    }

    #[test]
    fn test_sample_count_conversion() {
        assert_eq!(
            convert_sample_count(4).unwrap(),
            vk::SampleCountFlags::TYPE_4
        );
        assert!(convert_sample_count(3).is_err());
    }
}
