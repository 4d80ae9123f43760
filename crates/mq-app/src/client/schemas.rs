use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lora {
    pub enabled: bool,
    pub model_name: String,
    pub weight: f32,
}

/// Tunables for one inpaint request. `advanced_params` is passed through
/// untouched apart from the inpaint strength.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub style_selections: Vec<String>,
    pub performance_selection: String,
    pub aspect_ratios_selection: String,
    pub image_number: u32,
    pub image_seed: i64,
    pub sharpness: f32,
    pub guidance_scale: f32,
    pub base_model_name: String,
    pub refiner_model_name: String,
    pub refiner_switch: f32,
    pub loras: Vec<Lora>,
    pub inpaint_strength: f32,
    pub advanced_params: Map<String, Value>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        let mut loras = vec![Lora {
            enabled: true,
            model_name: "sd_xl_offset_example-lora_1.0.safetensors".into(),
            weight: 0.1,
        }];
        loras.extend((0..4).map(|_| Lora {
            enabled: true,
            model_name: "None".into(),
            weight: 1.0,
        }));

        Self {
            style_selections: vec![
                "Fooocus V2".into(),
                "Fooocus Enhance".into(),
                "Fooocus Sharp".into(),
            ],
            performance_selection: "Speed".into(),
            aspect_ratios_selection: "1152*896".into(),
            image_number: 1,
            image_seed: -1,
            sharpness: 2.0,
            guidance_scale: 4.0,
            base_model_name: "juggernautXL_v8Rundiffusion.safetensors".into(),
            refiner_model_name: "None".into(),
            refiner_switch: 0.5,
            loras,
            inpaint_strength: 1.0,
            advanced_params: default_advanced_params(),
        }
    }
}

fn default_advanced_params() -> Map<String, Value> {
    let value = json!({
        "adaptive_cfg": 7,
        "adm_scaler_end": 0.3,
        "adm_scaler_negative": 0.8,
        "adm_scaler_positive": 1.5,
        "black_out_nsfw": false,
        "canny_high_threshold": 128,
        "canny_low_threshold": 64,
        "clip_skip": 2,
        "controlnet_softness": 0.25,
        "debugging_cn_preprocessor": false,
        "debugging_dino": false,
        "debugging_enhance_masks_checkbox": false,
        "debugging_inpaint_preprocessor": false,
        "dino_erode_or_dilate": 0,
        "disable_intermediate_results": false,
        "disable_preview": false,
        "disable_seed_increment": false,
        "freeu_b1": 1.01,
        "freeu_b2": 1.02,
        "freeu_enabled": false,
        "freeu_s1": 0.99,
        "freeu_s2": 0.95,
        "inpaint_advanced_masking_checkbox": true,
        "inpaint_disable_initial_latent": false,
        "inpaint_engine": "v2.6",
        "inpaint_erode_or_dilate": 0,
        "inpaint_respective_field": 1,
        "invert_mask_checkbox": false,
        "mixing_image_prompt_and_inpaint": false,
        "mixing_image_prompt_and_vary_upscale": false,
        "overwrite_height": -1,
        "overwrite_step": -1,
        "overwrite_switch": -1,
        "overwrite_upscale_strength": -1,
        "overwrite_vary_strength": -1,
        "overwrite_width": -1,
        "refiner_swap_method": "joint",
        "sampler_name": "dpmpp_2m_sde_gpu",
        "scheduler_name": "karras",
        "skipping_cn_preprocessor": false,
        "vae_name": "Default (model)",
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Body of `POST /v2/generation/image-inpaint-outpaint`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InpaintRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub style_selections: Vec<String>,
    pub performance_selection: String,
    pub aspect_ratios_selection: String,
    pub image_number: u32,
    pub image_seed: i64,
    pub sharpness: f32,
    pub guidance_scale: f32,
    pub base_model_name: String,
    pub refiner_model_name: String,
    pub refiner_switch: f32,
    pub loras: Vec<Lora>,
    pub advanced_params: Map<String, Value>,
    pub save_meta: bool,
    pub meta_scheme: String,
    pub save_extension: String,
    pub save_name: String,
    pub read_wildcards_in_order: bool,
    pub require_base64: bool,
    pub async_process: bool,
    pub webhook_url: String,
    pub input_image: String,
    pub input_mask: String,
    pub inpaint_additional_prompt: String,
    pub outpaint_selections: Vec<String>,
    pub outpaint_distance_left: i32,
    pub outpaint_distance_right: i32,
    pub outpaint_distance_top: i32,
    pub outpaint_distance_bottom: i32,
    pub image_prompts: Vec<Value>,
}

impl InpaintRequest {
    pub fn new(
        prompt: String,
        negative_prompt: String,
        input_image: String,
        input_mask: String,
        params: &GenerationParams,
    ) -> Self {
        let mut advanced_params = params.advanced_params.clone();
        advanced_params.insert("inpaint_strength".into(), json!(params.inpaint_strength));

        Self {
            prompt,
            negative_prompt,
            style_selections: params.style_selections.clone(),
            performance_selection: params.performance_selection.clone(),
            aspect_ratios_selection: params.aspect_ratios_selection.clone(),
            image_number: params.image_number,
            image_seed: params.image_seed,
            sharpness: params.sharpness,
            guidance_scale: params.guidance_scale,
            base_model_name: params.base_model_name.clone(),
            refiner_model_name: params.refiner_model_name.clone(),
            refiner_switch: params.refiner_switch,
            loras: params.loras.clone(),
            advanced_params,
            save_meta: true,
            meta_scheme: "fooocus".into(),
            save_extension: "png".into(),
            save_name: String::new(),
            read_wildcards_in_order: false,
            require_base64: false,
            async_process: true,
            webhook_url: String::new(),
            input_image,
            input_mask,
            inpaint_additional_prompt: String::new(),
            outpaint_selections: Vec::new(),
            outpaint_distance_left: -1,
            outpaint_distance_right: -1,
            outpaint_distance_top: -1,
            outpaint_distance_bottom: -1,
            image_prompts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitResponse {
    pub job_id: Option<String>,
}

/// `GET /v1/generation/job-queue`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub running_size: u32,
    #[serde(default)]
    pub finished_size: u32,
    #[serde(default)]
    pub last_job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedJob {
    pub job_id: String,
    #[serde(default)]
    pub is_finished: bool,
}

/// `GET /v1/generation/job-history`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistorySnapshot {
    #[serde(default)]
    pub queue: Vec<QueuedJob>,
    #[serde(default)]
    pub history: Vec<QueuedJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobResultItem {
    #[serde(default)]
    pub base64: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub seed: Option<Value>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// `GET /v1/generation/query-job`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryJobResponse {
    pub job_id: String,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub job_stage: Option<String>,
    #[serde(default)]
    pub job_progress: f32,
    #[serde(default)]
    pub job_status: Option<String>,
    #[serde(default)]
    pub job_step_preview: Option<String>,
    #[serde(default)]
    pub job_result: Option<Vec<JobResultItem>>,
}

pub const STATUS_FINISHED: &str = "Finished";
pub const STAGE_ERROR: &str = "ERROR";

/// What the orchestrator needs from a query response.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub status: Option<String>,
    pub stage: Option<String>,
    pub progress: f32,
    pub result_ref: Option<String>,
}

impl JobSnapshot {
    pub fn is_finished(&self) -> bool {
        self.status.as_deref() == Some(STATUS_FINISHED) && self.result_ref.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.stage.as_deref() == Some(STAGE_ERROR)
    }
}

impl From<QueryJobResponse> for JobSnapshot {
    fn from(resp: QueryJobResponse) -> Self {
        let result_ref = resp
            .job_result
            .unwrap_or_default()
            .into_iter()
            .find_map(|item| item.url.filter(|u| !u.is_empty()));

        Self {
            status: resp.job_status,
            stage: resp.job_stage,
            progress: resp.job_progress,
            result_ref,
        }
    }
}
