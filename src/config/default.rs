// src/config/default.rs
//
// Known-good base configuration for the score model on 3-D brain MRI.
// Flow configurations are layered on top of this.

use std::path::PathBuf;

use super::{
    BaseDistribution, Config, DataConfig, EvalConfig, FlowConfig, InlierSplit, ModelConfig,
    OptimConfig, PatchConfig, TrainingConfig,
};
use crate::constants::DEFAULT_SEED;

pub fn get_default_config() -> Config {
    Config {
        training: TrainingConfig {
            batch_size: 8,
            n_iters: 1_500_000,
            log_freq: 50,
            eval_freq: 100,
            snapshot_freq: 10_000,
            use_fp16: false,
            sde: "vesde".to_string(),
            continuous: true,
            reduce_mean: true,
            likelihood_weighting: false,
        },
        eval: EvalConfig {
            batch_size: 16,
            sample_size: 8,
            checkpoint_num: -1,
        },
        data: DataConfig {
            dataset: "abcd".to_string(),
            ood_ds: "tumor".to_string(),
            dir_path: PathBuf::from("/DATA/processed"),
            splits_dir: PathBuf::from("/DATA/splits"),
            cache_rate: 0.0,
            image_size: [176, 208, 160],
            spacing: 1.0,
            centered: false,
            ood_inlier_split: InlierSplit::Val,
        },
        model: ModelConfig {
            name: "ncsnpp3d".to_string(),
            ema_rate: 0.9999,
            nf: 32,
            ch_mult: vec![1, 2, 2, 4],
            num_res_blocks: 2,
            dropout: 0.0,
            sigma_min: 0.09,
            sigma_max: 545.0,
            num_scales: 2000,
        },
        optim: OptimConfig {
            optimizer: "Adam".to_string(),
            lr: 3e-4,
            beta1: 0.9,
            eps: 1e-8,
            weight_decay: 0.0,
            warmup: 5000,
            grad_clip: 1.0,
        },
        flow: FlowConfig {
            base_distribution: BaseDistribution::GaussianMixture,
            gmm_components: 5,
            num_blocks: 4,
            context_embedding_size: 128,
            use_global_context: false,
            global_embedding_size: 512,
            input_norm: true,
            dropout: 0.0,
            lr: 2e-4,
            patch_batch_size: 128,
            patches_per_train_step: 256,
            training_kimg: 100,
            local_patch_config: PatchConfig {
                kernel_size: 3,
                padding: 1,
                stride: 1,
            },
            global_patch_config: PatchConfig {
                kernel_size: 17,
                padding: 4,
                stride: 4,
            },
        },
        seed: DEFAULT_SEED,
    }
}
