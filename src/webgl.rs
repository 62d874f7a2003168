#![cfg(target_arch = "wasm32")]

use crate::config::RendererOptions;
use crate::context::Viewport;
use crate::error::{EngineError, Result};
use crate::geometry::Mesh;
use crate::render::{Backend, FrameUniforms, COLOR_STRIDE, MATRIX_STRIDE};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    HtmlCanvasElement, WebGl2RenderingContext as GL, WebGlBuffer, WebGlProgram, WebGlShader,
    WebGlUniformLocation, WebGlVertexArrayObject,
};

const ATTR_POSITION: u32 = 0;
const ATTR_NORMAL: u32 = 1;
const ATTR_INSTANCE_MATRIX: u32 = 2;
const ATTR_INSTANCE_COLOR: u32 = 6;

const VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 position;
layout(location = 1) in vec3 normal;
layout(location = 2) in mat4 instanceMatrix;
layout(location = 6) in vec3 instanceColor;

uniform mat4 projectionMatrix;
uniform mat4 viewMatrix;

out vec3 vWorldPosition;
out vec3 vNormal;
out vec3 vColor;

void main() {
    vec4 world = instanceMatrix * vec4(position, 1.0);
    vWorldPosition = world.xyz;
    vNormal = mat3(instanceMatrix) * normal;
    vColor = instanceColor;
    gl_Position = projectionMatrix * viewMatrix * world;
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;

in vec3 vWorldPosition;
in vec3 vNormal;
in vec3 vColor;

uniform vec3 cameraPosition;
uniform vec3 lightPosition;
uniform vec3 lightColor;
uniform float lightIntensity;
uniform vec3 ambientColor;
uniform float ambientIntensity;
uniform float metalness;
uniform float roughness;
uniform float clearcoat;
uniform float clearcoatRoughness;

out vec4 fragColor;

const float PI = 3.14159265359;

float distributionGGX(float nh, float a) {
    float a2 = a * a;
    float d = nh * nh * (a2 - 1.0) + 1.0;
    return a2 / (PI * d * d);
}

vec3 fresnel(vec3 f0, float vh) {
    return f0 + (1.0 - f0) * pow(1.0 - vh, 5.0);
}

vec3 acesFilmic(vec3 c) {
    c *= 0.6;
    return clamp((c * (2.51 * c + 0.03)) / (c * (2.43 * c + 0.59) + 0.14), 0.0, 1.0);
}

vec3 linearToSrgb(vec3 c) {
    return mix(c * 12.92, 1.055 * pow(c, vec3(1.0 / 2.4)) - 0.055, step(vec3(0.0031308), c));
}

void main() {
    vec3 n = normalize(vNormal);
    vec3 v = normalize(cameraPosition - vWorldPosition);
    vec3 toLight = lightPosition - vWorldPosition;
    float dist = max(length(toLight), 1e-4);
    vec3 l = toLight / dist;
    vec3 h = normalize(l + v);
    float nl = max(dot(n, l), 0.0);
    float nh = max(dot(n, h), 0.0);
    float nv = max(dot(n, v), 1e-4);
    float vh = max(dot(v, h), 0.0);

    vec3 f0 = mix(vec3(0.04), vColor, metalness);
    vec3 diffuse = vColor * (1.0 - metalness);
    float a = max(roughness * roughness, 1e-3);
    float k = a * 0.5;
    float vis = 0.25 / ((nl * (1.0 - k) + k) * (nv * (1.0 - k) + k));
    vec3 f = fresnel(f0, vh);
    vec3 radiance = lightColor * lightIntensity / (dist * dist);
    vec3 color = (diffuse * (1.0 - f) / PI + f * distributionGGX(nh, a) * vis) * radiance * nl;

    float ca = max(clearcoatRoughness * clearcoatRoughness, 1e-3);
    float fc = 0.04 + 0.96 * pow(1.0 - vh, 5.0);
    color += clearcoat * fc * distributionGGX(nh, ca) * 0.25 * radiance * nl;

    // Room-like environment: brighter from above.
    vec3 env = mix(vec3(0.35), vec3(1.0), n.y * 0.5 + 0.5);
    color += ambientColor * ambientIntensity * (diffuse + f0 * 0.5) * env;

    fragColor = vec4(linearToSrgb(acesFilmic(color)), 1.0);
}
"#;

#[derive(Default)]
struct Uniforms {
    projection: Option<WebGlUniformLocation>,
    view: Option<WebGlUniformLocation>,
    camera_position: Option<WebGlUniformLocation>,
    light_position: Option<WebGlUniformLocation>,
    light_color: Option<WebGlUniformLocation>,
    light_intensity: Option<WebGlUniformLocation>,
    ambient_color: Option<WebGlUniformLocation>,
    ambient_intensity: Option<WebGlUniformLocation>,
    metalness: Option<WebGlUniformLocation>,
    roughness: Option<WebGlUniformLocation>,
    clearcoat: Option<WebGlUniformLocation>,
    clearcoat_roughness: Option<WebGlUniformLocation>,
}

impl Uniforms {
    fn locate(gl: &GL, program: &WebGlProgram) -> Self {
        let at = |name: &str| gl.get_uniform_location(program, name);
        Self {
            projection: at("projectionMatrix"),
            view: at("viewMatrix"),
            camera_position: at("cameraPosition"),
            light_position: at("lightPosition"),
            light_color: at("lightColor"),
            light_intensity: at("lightIntensity"),
            ambient_color: at("ambientColor"),
            ambient_intensity: at("ambientIntensity"),
            metalness: at("metalness"),
            roughness: at("roughness"),
            clearcoat: at("clearcoat"),
            clearcoat_roughness: at("clearcoatRoughness"),
        }
    }
}

/// WebGL2 instanced sphere renderer: one VAO, one draw call per frame.
pub struct WebGlBackend {
    gl: GL,
    canvas: HtmlCanvasElement,
    program: Option<WebGlProgram>,
    uniforms: Uniforms,
    vao: Option<WebGlVertexArrayObject>,
    mesh_buffers: Vec<WebGlBuffer>,
    matrix_buffer: Option<WebGlBuffer>,
    color_buffer: Option<WebGlBuffer>,
    index_count: i32,
    capacity: usize,
    clear_alpha: f32,
}

impl WebGlBackend {
    pub fn new(canvas: &HtmlCanvasElement, options: &RendererOptions) -> Result<Self> {
        let attributes = serde_wasm_bindgen::to_value(options)
            .map_err(|e| EngineError::Js(e.to_string()))?;
        let gl = canvas
            .get_context_with_context_options("webgl2", &attributes)
            .map_err(js_error)?
            .ok_or(EngineError::ContextUnavailable)?
            .dyn_into::<GL>()
            .map_err(|_| EngineError::ContextUnavailable)?;

        let program = link_program(&gl, VERTEX_SHADER, FRAGMENT_SHADER)?;
        let uniforms = Uniforms::locate(&gl, &program);
        gl.enable(GL::DEPTH_TEST);
        gl.enable(GL::CULL_FACE);

        Ok(Self {
            gl,
            canvas: canvas.clone(),
            program: Some(program),
            uniforms,
            vao: None,
            mesh_buffers: Vec::new(),
            matrix_buffer: None,
            color_buffer: None,
            index_count: 0,
            capacity: 0,
            clear_alpha: if options.alpha { 0.0 } else { 1.0 },
        })
    }

    fn release_geometry(&mut self) {
        for buffer in self.mesh_buffers.drain(..) {
            self.gl.delete_buffer(Some(&buffer));
        }
        self.gl.delete_buffer(self.matrix_buffer.take().as_ref());
        self.gl.delete_buffer(self.color_buffer.take().as_ref());
        self.gl.delete_vertex_array(self.vao.take().as_ref());
    }

    fn static_buffer(&mut self, target: u32, data: &js_sys::Object) -> Option<WebGlBuffer> {
        let buffer = self.gl.create_buffer()?;
        self.gl.bind_buffer(target, Some(&buffer));
        self.gl.buffer_data_with_array_buffer_view(target, data, GL::STATIC_DRAW);
        self.mesh_buffers.push(buffer.clone());
        Some(buffer)
    }

    fn instance_buffer(&self, floats: usize) -> Option<WebGlBuffer> {
        let buffer = self.gl.create_buffer()?;
        self.gl.bind_buffer(GL::ARRAY_BUFFER, Some(&buffer));
        self.gl.buffer_data_with_i32(GL::ARRAY_BUFFER, (floats * 4) as i32, GL::DYNAMIC_DRAW);
        Some(buffer)
    }

    fn upload(&self, buffer: Option<&WebGlBuffer>, data: &[f32], stride: usize) {
        let Some(buffer) = buffer else { return };
        let len = data.len().min(self.capacity * stride);
        self.gl.bind_buffer(GL::ARRAY_BUFFER, Some(buffer));
        self.gl.buffer_sub_data_with_i32_and_array_buffer_view(
            GL::ARRAY_BUFFER,
            0,
            &js_sys::Float32Array::from(&data[..len]),
        );
    }
}

impl Backend for WebGlBackend {
    fn prepare(&mut self, mesh: &Mesh, capacity: usize) {
        self.release_geometry();
        let gl = self.gl.clone();
        self.vao = gl.create_vertex_array();
        gl.bind_vertex_array(self.vao.as_ref());

        let positions = js_sys::Float32Array::from(&mesh.positions[..]);
        if self.static_buffer(GL::ARRAY_BUFFER, &positions).is_some() {
            gl.enable_vertex_attrib_array(ATTR_POSITION);
            gl.vertex_attrib_pointer_with_i32(ATTR_POSITION, 3, GL::FLOAT, false, 0, 0);
        }
        let normals = js_sys::Float32Array::from(&mesh.normals[..]);
        if self.static_buffer(GL::ARRAY_BUFFER, &normals).is_some() {
            gl.enable_vertex_attrib_array(ATTR_NORMAL);
            gl.vertex_attrib_pointer_with_i32(ATTR_NORMAL, 3, GL::FLOAT, false, 0, 0);
        }
        let indices = js_sys::Uint16Array::from(&mesh.indices[..]);
        self.static_buffer(GL::ELEMENT_ARRAY_BUFFER, &indices);
        self.index_count = mesh.indices.len() as i32;

        self.capacity = capacity;
        self.matrix_buffer = self.instance_buffer(capacity.max(1) * MATRIX_STRIDE);
        let row_bytes = 4 * 4;
        for column in 0..4u32 {
            let loc = ATTR_INSTANCE_MATRIX + column;
            gl.enable_vertex_attrib_array(loc);
            gl.vertex_attrib_pointer_with_i32(
                loc,
                4,
                GL::FLOAT,
                false,
                (MATRIX_STRIDE * 4) as i32,
                column as i32 * row_bytes,
            );
            gl.vertex_attrib_divisor(loc, 1);
        }

        self.color_buffer = self.instance_buffer(capacity.max(1) * COLOR_STRIDE);
        gl.enable_vertex_attrib_array(ATTR_INSTANCE_COLOR);
        gl.vertex_attrib_pointer_with_i32(ATTR_INSTANCE_COLOR, 3, GL::FLOAT, false, 0, 0);
        gl.vertex_attrib_divisor(ATTR_INSTANCE_COLOR, 1);

        gl.bind_vertex_array(None);
    }

    fn upload_matrices(&mut self, matrices: &[f32]) {
        self.upload(self.matrix_buffer.as_ref(), matrices, MATRIX_STRIDE);
    }

    fn upload_colors(&mut self, colors: &[f32]) {
        self.upload(self.color_buffer.as_ref(), colors, COLOR_STRIDE);
    }

    fn resize(&mut self, viewport: &Viewport) {
        let (w, h) = viewport.drawing_buffer_size();
        self.canvas.set_width(w);
        self.canvas.set_height(h);
        let style = self.canvas.style();
        let _ = style.set_property("width", &format!("{}px", viewport.width));
        let _ = style.set_property("height", &format!("{}px", viewport.height));
        self.gl.viewport(0, 0, w as i32, h as i32);
    }

    fn draw(&mut self, frame: &FrameUniforms) {
        let gl = &self.gl;
        gl.clear_color(0.0, 0.0, 0.0, self.clear_alpha);
        gl.clear(GL::COLOR_BUFFER_BIT | GL::DEPTH_BUFFER_BIT);
        let Some(program) = self.program.as_ref() else { return };
        let count = frame.instance_count.min(self.capacity);
        if count == 0 || self.vao.is_none() {
            return;
        }

        gl.use_program(Some(program));
        let u = &self.uniforms;
        gl.uniform_matrix4fv_with_f32_array(u.projection.as_ref(), false, frame.projection.as_slice());
        gl.uniform_matrix4fv_with_f32_array(u.view.as_ref(), false, frame.view.as_slice());
        gl.uniform3fv_with_f32_array(u.camera_position.as_ref(), frame.camera_position.as_slice());
        gl.uniform3fv_with_f32_array(u.light_position.as_ref(), frame.light.position.as_slice());
        gl.uniform3fv_with_f32_array(u.light_color.as_ref(), &frame.light.color.to_array());
        gl.uniform1f(u.light_intensity.as_ref(), frame.light.intensity);
        gl.uniform3fv_with_f32_array(u.ambient_color.as_ref(), &frame.ambient.color.to_array());
        gl.uniform1f(u.ambient_intensity.as_ref(), frame.ambient.intensity);
        gl.uniform1f(u.metalness.as_ref(), frame.material.metalness);
        gl.uniform1f(u.roughness.as_ref(), frame.material.roughness);
        gl.uniform1f(u.clearcoat.as_ref(), frame.material.clearcoat);
        gl.uniform1f(u.clearcoat_roughness.as_ref(), frame.material.clearcoat_roughness);

        gl.bind_vertex_array(self.vao.as_ref());
        gl.draw_elements_instanced_with_i32(
            GL::TRIANGLES,
            self.index_count,
            GL::UNSIGNED_SHORT,
            0,
            count as i32,
        );
        gl.bind_vertex_array(None);
    }

    fn dispose(&mut self) {
        self.release_geometry();
        self.gl.delete_program(self.program.take().as_ref());
        self.capacity = 0;
        // Hand the context back to the browser right away.
        if let Ok(Some(ext)) = self.gl.get_extension("WEBGL_lose_context") {
            if let Ok(lose) = js_sys::Reflect::get(&ext, &JsValue::from_str("loseContext")) {
                if let Ok(lose) = lose.dyn_into::<js_sys::Function>() {
                    let _ = lose.call0(&ext);
                }
            }
        }
    }
}

fn compile_shader(gl: &GL, kind: u32, source: &str) -> Result<WebGlShader> {
    let shader = gl
        .create_shader(kind)
        .ok_or_else(|| EngineError::Shader("unable to create shader".to_string()))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);
    if gl
        .get_shader_parameter(&shader, GL::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(shader)
    } else {
        let log = gl.get_shader_info_log(&shader).unwrap_or_default();
        gl.delete_shader(Some(&shader));
        Err(EngineError::Shader(log))
    }
}

fn link_program(gl: &GL, vertex: &str, fragment: &str) -> Result<WebGlProgram> {
    let vs = compile_shader(gl, GL::VERTEX_SHADER, vertex)?;
    let fs = compile_shader(gl, GL::FRAGMENT_SHADER, fragment)?;
    let program = gl
        .create_program()
        .ok_or_else(|| EngineError::Shader("unable to create program".to_string()))?;
    gl.attach_shader(&program, &vs);
    gl.attach_shader(&program, &fs);
    gl.link_program(&program);
    gl.delete_shader(Some(&vs));
    gl.delete_shader(Some(&fs));
    if gl
        .get_program_parameter(&program, GL::LINK_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(program)
    } else {
        let log = gl.get_program_info_log(&program).unwrap_or_default();
        gl.delete_program(Some(&program));
        Err(EngineError::Shader(log))
    }
}

pub(crate) fn js_error(value: JsValue) -> EngineError {
    EngineError::Js(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}
